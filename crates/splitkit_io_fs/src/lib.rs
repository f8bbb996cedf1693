//! `splitkit_io_fs` v1:
//! Filesystem side of the split pipeline.
//!
//! - `workdir` : scoped transient working directory
//! - `archive` : flat zip packaging
//! - `spec`    : enums/options/errors
//! - `report`  : archive report model
//! - `util`    : atomic write and worker helpers

pub mod archive;
pub mod report;
pub mod spec;
pub mod util;
pub mod workdir;

pub use archive::create_zip_archive;
pub use report::ReportArchive;
pub use spec::{EnumArchiveCompression, PackagingError, SpecArchiveOptions, WorkdirError};
pub use util::{calculate_worker_limit, remove_file_if_exists, write_file_atomic};
pub use workdir::SpecWorkdir;
