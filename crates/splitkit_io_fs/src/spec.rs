//! Archive/workdir specification models and top-level error types.

use std::path::PathBuf;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Compression applied to every archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumArchiveCompression {
    /// Store entries uncompressed.
    Stored,
    /// Deflate-compress entries (default).
    #[default]
    Deflated,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `create_zip_archive`.
#[derive(Debug, Clone, Default)]
pub struct SpecArchiveOptions {
    /// Entry compression method.
    pub rule_compression: EnumArchiveCompression,
}

/// Working directory setup failure.
#[derive(Debug, Error)]
pub enum WorkdirError {
    /// The transient directory could not be created.
    #[error("Failed to create working directory under {}: {message}", .parent.display())]
    CreateFailed {
        /// Parent directory the working directory was requested in.
        parent: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
}

/// Archive assembly failure. No partial archive exists when this is returned.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// Archive was requested for zero input files.
    #[error("Packaging failed: no input files")]
    NoInputs,
    /// One input file has no usable file name.
    #[error("Packaging failed: input has no file name: {}", .path.display())]
    InvalidInputName {
        /// Offending input path.
        path: PathBuf,
    },
    /// Two inputs flatten to the same entry name.
    #[error("Packaging failed: duplicate entry name {0:?}")]
    DuplicateEntry(String),
    /// One input could not be read.
    #[error("Packaging failed: cannot read {}: {message}", .path.display())]
    ReadInput {
        /// Offending input path.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// The archive itself could not be written or committed.
    #[error("Packaging failed: cannot write {}: {message}", .path.display())]
    WriteArchive {
        /// Archive destination path.
        path: PathBuf,
        /// Underlying IO/zip error text.
        message: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
