//! Stateless helper utilities shared by the reader and writer.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::EnumCellValue;

////////////////////////////////////////////////////////////////////////////////
// #region NameValidation

/// Validate that `names` has no duplicates; `label` names the thing in errors.
pub fn validate_unique_names(names: &[String], label: &str) -> Result<(), String> {
    if names.len() == names.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in names.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate {label} names detected: {c_msg}"))
}

/// Rename repeated header names `a, a, a` to `a, a.1, a.2`.
///
/// A generated name that collides with a later literal header keeps counting
/// until it is free.
pub fn derive_deduplicated_names(names: Vec<String>) -> Vec<String> {
    let set_literal: BTreeSet<String> = names.iter().cloned().collect();
    let mut set_taken: BTreeSet<String> = BTreeSet::new();
    let mut dict_counts: BTreeMap<String, usize> = BTreeMap::new();

    let mut l_out = Vec::with_capacity(names.len());
    for c_name in names {
        if set_taken.insert(c_name.clone()) {
            l_out.push(c_name);
            continue;
        }
        let n_count = dict_counts.entry(c_name.clone()).or_insert(0);
        let c_candidate = loop {
            *n_count += 1;
            let c_candidate = format!("{c_name}.{n_count}");
            if !set_taken.contains(&c_candidate) && !set_literal.contains(&c_candidate) {
                break c_candidate;
            }
        };
        set_taken.insert(c_candidate.clone());
        l_out.push(c_candidate);
    }
    l_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    estimate_unicode_string_width(&value.display_text())
}

/// Width units for text; non-ASCII chars count as 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
