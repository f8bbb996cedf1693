//! Split specification models, options and top-level error types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use splitkit_io_fs::{SpecArchiveOptions, WorkdirError};
use splitkit_io_xlsx::conf::derive_default_xlsx_write_options;
use splitkit_io_xlsx::{EnumCellValue, ReadWorkbookError, SpecTable, SpecXlsxWriteOptions};
use thiserror::Error;

use crate::conf::{
    C_ARCHIVE_FILE_EXT, C_ARCHIVE_FILE_NAME, N_CACHE_PLANS_DEFAULT, N_CACHE_WORKBOOKS_DEFAULT,
};
use crate::report::SpecSheetCount;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumSplitStage {
    /// Workbook parsing.
    Load,
    /// Distinct value collection.
    Partition,
    /// Per-value workbook rendering and commit.
    Export,
    /// Archive assembly.
    Package,
}

impl fmt::Display for EnumSplitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_name = match self {
            Self::Load => "load",
            Self::Partition => "partition",
            Self::Export => "export",
            Self::Package => "package",
        };
        write!(f, "{c_name}")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Input options for [`crate::pipeline::Splitter`].
#[derive(Debug, Clone)]
pub struct SpecSplitOptions {
    /// Maximum worker threads for the export stage.
    pub num_workers_max: Option<usize>,
    /// Parent of the per-run working directory; system temp dir when `None`.
    pub path_dir_work_parent: Option<PathBuf>,
    /// Archive file name; must be a plain `*.zip` name.
    pub archive_file_name: String,
    /// Bundle exported files into one archive.
    pub if_create_archive: bool,
    /// Writer options for every output workbook.
    pub write_options: SpecXlsxWriteOptions,
    /// Archive options.
    pub archive_options: SpecArchiveOptions,
    /// Parsed workbooks kept in memory (0 disables).
    pub cache_workbooks_max: usize,
    /// Split plans kept in memory (0 disables).
    pub cache_plans_max: usize,
}

impl Default for SpecSplitOptions {
    fn default() -> Self {
        Self {
            num_workers_max: None,
            path_dir_work_parent: None,
            archive_file_name: C_ARCHIVE_FILE_NAME.to_string(),
            if_create_archive: true,
            write_options: derive_default_xlsx_write_options(),
            archive_options: SpecArchiveOptions::default(),
            cache_workbooks_max: N_CACHE_WORKBOOKS_DEFAULT,
            cache_plans_max: N_CACHE_PLANS_DEFAULT,
        }
    }
}

impl SpecSplitOptions {
    /// Reject option combinations the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), SplitError> {
        let c_name = self.archive_file_name.as_str();
        if c_name.is_empty() || c_name.contains(['/', '\\']) || c_name.starts_with('.') {
            return Err(SplitError::InvalidOptions(format!(
                "archive_file_name must be a plain file name: {c_name:?}"
            )));
        }
        if !c_name
            .to_ascii_lowercase()
            .ends_with(&format!(".{C_ARCHIVE_FILE_EXT}"))
        {
            return Err(SplitError::InvalidOptions(format!(
                "archive_file_name must end with .{C_ARCHIVE_FILE_EXT}: {c_name:?}"
            )));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag shared between a request and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, not-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; visible to every clone.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PlanModels

/// Rows matching one distinct value, per sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecValuePartition {
    /// Distinct value of the split column.
    pub value: EnumCellValue,
    /// Output workbook file name (unique within the plan).
    pub file_name: String,
    /// `(sheet name, filtered table)`; sheets without matches are absent.
    pub sheets: Vec<(String, SpecTable)>,
}

impl SpecValuePartition {
    /// Per-sheet row counts in sheet order.
    pub fn row_counts(&self) -> Vec<SpecSheetCount> {
        self.sheets
            .iter()
            .map(|(sheet_name, table)| SpecSheetCount {
                sheet_name: sheet_name.clone(),
                rows: table.height(),
            })
            .collect()
    }

    /// Rows across all sheets.
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|(_, table)| table.height()).sum()
    }
}

/// Full partition of a workbook by one column; cacheable, file-free.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSplitPlan {
    /// Split column name.
    pub column: String,
    /// Sheets that contain the column, in workbook order.
    pub sheets_with_column: Vec<String>,
    /// One partition per distinct value, sorted by value.
    pub partitions: Vec<SpecValuePartition>,
}

impl SpecSplitPlan {
    /// Distinct values in plan order.
    pub fn values(&self) -> Vec<EnumCellValue> {
        self.partitions.iter().map(|part| part.value.clone()).collect()
    }

    /// Whether there is nothing to export.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// One committed output workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecValueExport {
    /// Committed output path.
    pub path_file: PathBuf,
    /// Rows per sheet as written; names are the final workbook sheet names.
    pub sheets: Vec<SpecSheetCount>,
}

/// Outcome of one export batch, in partition order.
#[derive(Debug, Default)]
pub struct SpecExportBatch {
    /// One result per partition.
    pub results: Vec<Result<SpecValueExport, ExportWriteError>>,
    /// Non-fatal notes (e.g. thread pool fallback).
    pub warnings: Vec<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure of one value's export; other values are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportWriteError {
    /// Rendering or committing the workbook failed.
    #[error("Export failed for value {value:?}: {message}")]
    Write {
        /// Display text of the offending value.
        value: String,
        /// Underlying failure text.
        message: String,
    },
    /// The run was cancelled before this value was committed.
    #[error("Export cancelled for value {value:?}")]
    Cancelled {
        /// Display text of the abandoned value.
        value: String,
    },
}

/// Run-level failure.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Upload is not a readable workbook.
    #[error("[load] {0}")]
    UnreadableWorkbook(#[from] ReadWorkbookError),
    /// Options rejected before any work started.
    #[error("[options] {0}")]
    InvalidOptions(String),
    /// Working directory could not be created.
    #[error("[workdir] {0}")]
    Workdir(#[from] WorkdirError),
    /// Archive deliverable is unavailable.
    #[error("[package] {0}")]
    Packaging(String),
    /// The request was aborted; no outputs survive.
    #[error("split cancelled")]
    Cancelled,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
