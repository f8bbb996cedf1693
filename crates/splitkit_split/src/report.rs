//! Split report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use splitkit_io_xlsx::EnumCellValue;

use crate::spec::EnumSplitStage;

/// Rows of one value found in one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetCount {
    /// Sheet name.
    pub sheet_name: String,
    /// Matching rows.
    pub rows: usize,
}

/// One successfully exported value.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecValueSummary {
    /// Split value.
    pub value: EnumCellValue,
    /// Output file name.
    pub file_name: String,
    /// Committed output path.
    pub path_file: PathBuf,
    /// Per-sheet counts in sheet order.
    pub sheets: Vec<SpecSheetCount>,
}

impl SpecValueSummary {
    /// Rows across all sheets.
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|count| count.rows).sum()
    }
}

/// One value that produced no file.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecValueFailure {
    /// Split value.
    pub value: EnumCellValue,
    /// Stage that failed.
    pub stage: EnumSplitStage,
    /// Failure text.
    pub message: String,
}

/// Archive deliverable state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EnumArchiveStatus {
    /// Archive creation disabled by options.
    #[default]
    NotRequested,
    /// Nothing was exported, so nothing was bundled.
    Skipped,
    /// Archive committed.
    Created {
        /// Archive path.
        path_archive: PathBuf,
        /// Entry count.
        n_entries: usize,
    },
    /// Archive unavailable; per-value files may still exist.
    Failed(String),
}

impl EnumArchiveStatus {
    /// Short status keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequested => "off",
            Self::Skipped => "skipped",
            Self::Created { .. } => "created",
            Self::Failed(_) => "failed",
        }
    }
}

/// Aggregate outcome of one split run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportSplit {
    /// Split column.
    pub column: String,
    /// Exported values, in value order.
    pub values: Vec<SpecValueSummary>,
    /// Values without output, in value order.
    pub failures: Vec<SpecValueFailure>,
    /// Archive state.
    pub archive: EnumArchiveStatus,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportSplit {
    /// Number of output files.
    pub fn file_count(&self) -> usize {
        self.values.len()
    }

    /// Number of failed values.
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Rows exported across all files.
    pub fn total_rows(&self) -> usize {
        self.values.iter().map(SpecValueSummary::total_rows).sum()
    }

    /// `(value, sheet, rows)` triples in report order.
    pub fn to_count_rows(&self) -> Vec<(String, String, usize)> {
        self.values
            .iter()
            .flat_map(|summary| {
                summary.sheets.iter().map(|count| {
                    (
                        summary.value.display_text(),
                        count.sheet_name.clone(),
                        count.rows,
                    )
                })
            })
            .collect()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert(
            "cnt_values".to_string(),
            (self.file_count() + self.failure_count()) as u64,
        );
        dict_counts.insert("cnt_files".to_string(), self.file_count() as u64);
        dict_counts.insert("cnt_rows".to_string(), self.total_rows() as u64);
        dict_counts.insert("cnt_failed".to_string(), self.failure_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warnings.len() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} column={:?} values={} files={} rows={} failed={} archive={}",
            self.column,
            dict_counts["cnt_values"],
            dict_counts["cnt_files"],
            dict_counts["cnt_rows"],
            dict_counts["cnt_failed"],
            self.archive.as_str()
        )
    }

    /// Per-value sheet/row tables for display.
    pub fn render_table(&self) -> String {
        let mut l_lines = Vec::new();
        if self.values.is_empty() && self.failures.is_empty() {
            l_lines.push(format!("No values found for column {:?}.", self.column));
        }
        for summary in &self.values {
            let n_width = summary
                .sheets
                .iter()
                .map(|count| count.sheet_name.chars().count())
                .chain(std::iter::once("Sheet".len()))
                .max()
                .unwrap_or_default();
            l_lines.push(format!(
                "Value: {} ({})",
                summary.value.display_text(),
                summary.file_name
            ));
            l_lines.push(format!("  {:<n_width$} | Rows", "Sheet"));
            for count in &summary.sheets {
                l_lines.push(format!("  {:<n_width$} | {}", count.sheet_name, count.rows));
            }
        }
        for failure in &self.failures {
            l_lines.push(format!(
                "Failed: {} [{}] {}",
                failure.value.display_text(),
                failure.stage,
                failure.message
            ));
        }
        match &self.archive {
            EnumArchiveStatus::Created {
                path_archive,
                n_entries,
            } => l_lines.push(format!(
                "Archive: {} ({n_entries} entries)",
                path_archive
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default()
            )),
            EnumArchiveStatus::Failed(message) => {
                l_lines.push(format!("Archive: failed ({message})"))
            }
            EnumArchiveStatus::NotRequested | EnumArchiveStatus::Skipped => {}
        }
        l_lines.join("\n")
    }
}

impl fmt::Display for ReportSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[SPLIT]"))
    }
}

/// Mutable accumulator for split outcomes.
#[derive(Debug, Default, Clone)]
pub struct ReportSplitBuilder {
    /// See [`ReportSplit::column`].
    pub column: String,
    /// See [`ReportSplit::values`].
    pub values: Vec<SpecValueSummary>,
    /// See [`ReportSplit::failures`].
    pub failures: Vec<SpecValueFailure>,
    /// See [`ReportSplit::archive`].
    pub archive: EnumArchiveStatus,
    /// See [`ReportSplit::warnings`].
    pub warnings: Vec<String>,
}

impl ReportSplitBuilder {
    /// Start a report for `column`.
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ..Self::default()
        }
    }

    /// Add one exported value.
    pub fn add_export(
        &mut self,
        value: EnumCellValue,
        file_name: String,
        path_file: PathBuf,
        sheets: Vec<SpecSheetCount>,
    ) {
        self.values.push(SpecValueSummary {
            value,
            file_name,
            path_file,
            sheets,
        });
    }

    /// Add one failed value.
    pub fn add_failure(&mut self, value: EnumCellValue, stage: EnumSplitStage, message: String) {
        self.failures.push(SpecValueFailure {
            value,
            stage,
            message,
        });
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Record the archive outcome.
    pub fn set_archive(&mut self, archive: EnumArchiveStatus) {
        self.archive = archive;
    }

    /// Finalize builder into immutable report, values sorted.
    pub fn build(mut self) -> ReportSplit {
        self.values.sort_by(|a, b| a.value.cmp(&b.value));
        self.failures.sort_by(|a, b| a.value.cmp(&b.value));
        ReportSplit {
            column: self.column,
            values: self.values,
            failures: self.failures,
            archive: self.archive,
            warnings: self.warnings,
        }
    }
}
