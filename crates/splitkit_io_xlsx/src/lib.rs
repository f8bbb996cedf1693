//! `splitkit_io_xlsx` v1:
//! Workbook codec layer for the split pipeline.
//!
//! - `conf`   : constants and default presets
//! - `spec`   : typed cell/table/workbook models, options, errors
//! - `util`   : pure helper functions
//! - `reader` : calamine-backed workbook loader
//! - `writer` : rust_xlsxwriter-backed sheet writer
pub mod conf;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use reader::read_workbook_from_bytes;
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumColumnKind, ReadWorkbookError,
    SpecAutofitCellsPolicy, SpecCellFormat, SpecSheetReport, SpecTable, SpecWorkbook,
    SpecXlsxWriteOptions,
};
pub use util::sanitize_sheet_name;
pub use writer::XlsxWriter;
