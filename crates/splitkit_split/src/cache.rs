//! Content-addressed memoization of parsed workbooks and split plans.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use sha2::{Digest, Sha256};
use splitkit_io_xlsx::SpecWorkbook;
use tracing::debug;

use crate::spec::SpecSplitPlan;

type TypePlanKey = (String, String);

/// Hex SHA-256 of the uploaded bytes.
pub fn derive_content_fingerprint(v_bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(v_bytes))
}

/// Hit/miss counters of one [`SplitCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecCacheStats {
    /// Workbook lookups served from cache.
    pub cnt_workbook_hits: u64,
    /// Workbook lookups that ran the loader.
    pub cnt_workbook_misses: u64,
    /// Plan lookups served from cache.
    pub cnt_plan_hits: u64,
    /// Plan lookups that ran the planner.
    pub cnt_plan_misses: u64,
}

/// Bounded LRU caches keyed by content fingerprint.
///
/// Workbooks are keyed by fingerprint, plans by `(fingerprint, column)`.
/// A capacity of 0 disables that layer. Output files are never cached.
pub struct SplitCache {
    lru_workbooks: Option<Mutex<LruCache<String, Arc<SpecWorkbook>>>>,
    lru_plans: Option<Mutex<LruCache<TypePlanKey, Arc<SpecSplitPlan>>>>,
    stats: Mutex<SpecCacheStats>,
}

impl SplitCache {
    /// Empty cache holding at most `n_workbooks_max` workbooks and
    /// `n_plans_max` plans.
    pub fn new(n_workbooks_max: usize, n_plans_max: usize) -> Self {
        Self {
            lru_workbooks: NonZeroUsize::new(n_workbooks_max).map(|n| Mutex::new(LruCache::new(n))),
            lru_plans: NonZeroUsize::new(n_plans_max).map(|n| Mutex::new(LruCache::new(n))),
            stats: Mutex::new(SpecCacheStats::default()),
        }
    }

    /// Cached workbook for `fingerprint`, or the result of `loader`.
    ///
    /// Loader errors are returned as-is and never cached.
    pub fn get_or_load_workbook<E, F>(
        &self,
        fingerprint: &str,
        loader: F,
    ) -> Result<Arc<SpecWorkbook>, E>
    where
        F: FnOnce() -> Result<SpecWorkbook, E>,
    {
        if let Some(lru) = &self.lru_workbooks
            && let Some(workbook) = lock(lru).get(fingerprint).cloned()
        {
            lock(&self.stats).cnt_workbook_hits += 1;
            debug!(fingerprint, "workbook cache hit");
            return Ok(workbook);
        }
        lock(&self.stats).cnt_workbook_misses += 1;

        let workbook = Arc::new(loader()?);
        if let Some(lru) = &self.lru_workbooks {
            lock(lru).put(fingerprint.to_string(), Arc::clone(&workbook));
        }
        Ok(workbook)
    }

    /// Cached plan for `(fingerprint, column)`, or the result of `planner`.
    pub fn get_or_plan<F>(&self, fingerprint: &str, column: &str, planner: F) -> Arc<SpecSplitPlan>
    where
        F: FnOnce() -> SpecSplitPlan,
    {
        let key: TypePlanKey = (fingerprint.to_string(), column.to_string());
        if let Some(lru) = &self.lru_plans
            && let Some(plan) = lock(lru).get(&key).cloned()
        {
            lock(&self.stats).cnt_plan_hits += 1;
            debug!(fingerprint, column, "plan cache hit");
            return plan;
        }
        lock(&self.stats).cnt_plan_misses += 1;

        let plan = Arc::new(planner());
        if let Some(lru) = &self.lru_plans {
            lock(lru).put(key, Arc::clone(&plan));
        }
        plan
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> SpecCacheStats {
        *lock(&self.stats)
    }

    /// Cached workbook and plan counts.
    pub fn entry_counts(&self) -> (usize, usize) {
        (
            self.lru_workbooks.as_ref().map_or(0, |lru| lock(lru).len()),
            self.lru_plans.as_ref().map_or(0, |lru| lock(lru).len()),
        )
    }

    /// Drop every cached entry; counters are kept.
    pub fn clear(&self) {
        if let Some(lru) = &self.lru_workbooks {
            lock(lru).clear();
        }
        if let Some(lru) = &self.lru_plans {
            lock(lru).clear();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
