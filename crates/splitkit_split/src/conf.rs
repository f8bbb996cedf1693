//! Split pipeline constants.

/// Default name of the bundled archive.
pub const C_ARCHIVE_FILE_NAME: &str = "filtered_files.zip";
/// Required archive extension.
pub const C_ARCHIVE_FILE_EXT: &str = "zip";
/// Extension of every per-value output workbook.
pub const C_OUTPUT_FILE_EXT: &str = "xlsx";
/// Stem used when a value sanitizes to nothing.
pub const C_FILE_STEM_BLANK: &str = "_blank";
/// Maximum file stem length in UTF-8 bytes, before the `__N.xlsx` suffix.
///
/// Most filesystems cap a file name at 255 bytes.
pub const N_LEN_FILE_STEM_MAX: usize = 200;
/// Device names Windows refuses as file stems.
pub const TUP_FILE_STEM_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Default number of parsed workbooks kept in memory.
pub const N_CACHE_WORKBOOKS_DEFAULT: usize = 8;
/// Default number of split plans kept in memory.
pub const N_CACHE_PLANS_DEFAULT: usize = 32;
