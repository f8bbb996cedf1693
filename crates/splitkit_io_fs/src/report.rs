//! Archive report model.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Outcome of one successful `create_zip_archive` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportArchive {
    /// Committed archive path.
    pub path_archive: PathBuf,
    /// Entry names in archive order.
    pub entries: Vec<String>,
    /// Total uncompressed bytes copied into the archive.
    pub cnt_bytes_source: u64,
    /// Archive size on disk.
    pub cnt_bytes_archive: u64,
}

impl ReportArchive {
    /// Number of archive entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_entries".to_string(), self.entry_count() as u64);
        dict_counts.insert("cnt_bytes_source".to_string(), self.cnt_bytes_source);
        dict_counts.insert("cnt_bytes_archive".to_string(), self.cnt_bytes_archive);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} path={} entries={} bytes_source={} bytes_archive={}",
            self.path_archive.display(),
            self.entry_count(),
            self.cnt_bytes_source,
            self.cnt_bytes_archive
        )
    }
}

impl fmt::Display for ReportArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[ZIP]"))
    }
}
