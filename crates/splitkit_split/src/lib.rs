//! `splitkit_split` v1:
//! Split a multi-sheet workbook into one workbook per distinct column value.
//!
//! - `conf`      : constants and default presets
//! - `spec`      : options, plan models, cancellation, errors
//! - `util`      : file name helpers
//! - `partition` : distinct value discovery
//! - `export`    : per-value planning and parallel export
//! - `report`    : run report model and builder
//! - `cache`     : fingerprint-keyed LRU memoization
//! - `pipeline`  : load -> partition -> export -> package orchestration

pub mod cache;
pub mod conf;
pub mod export;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod spec;
pub mod util;

pub use cache::{SpecCacheStats, SplitCache, derive_content_fingerprint};
pub use export::{
    export_all, export_value_partition, normalize_temporal_columns, plan_split,
    plan_value_partition,
};
pub use partition::{collect_distinct_values, count_rows_with_value};
pub use pipeline::{SpecSplitOutput, Splitter};
pub use report::{
    EnumArchiveStatus, ReportSplit, ReportSplitBuilder, SpecSheetCount, SpecValueFailure,
    SpecValueSummary,
};
pub use spec::{
    CancelToken, EnumSplitStage, ExportWriteError, SpecExportBatch, SpecSplitOptions,
    SpecSplitPlan, SpecValueExport, SpecValuePartition, SplitError,
};
pub use util::derive_output_file_names;
