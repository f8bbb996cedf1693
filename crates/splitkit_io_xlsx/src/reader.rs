//! Workbook loader: raw upload bytes into an in-memory [`SpecWorkbook`].

use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::conf::C_HEADER_UNNAMED_PREFIX;
use crate::spec::{EnumCellValue, ReadWorkbookError, SpecTable, SpecWorkbook};
use crate::util::derive_deduplicated_names;

/// Parse workbook bytes (xlsx/xlsm/xlsb/xls/ods) into sheet tables.
///
/// The first row of every sheet's used range is the header. A sheet with an
/// empty used range loads as a zero-column table.
pub fn read_workbook_from_bytes(v_bytes: &[u8]) -> Result<SpecWorkbook, ReadWorkbookError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(v_bytes))
        .map_err(|err| ReadWorkbookError::Unreadable(err.to_string()))?;

    let l_sheet_names = workbook.sheet_names();
    if l_sheet_names.is_empty() {
        return Err(ReadWorkbookError::NoSheets);
    }

    let mut l_sheets = Vec::with_capacity(l_sheet_names.len());
    for sheet_name in l_sheet_names {
        let range =
            workbook
                .worksheet_range(&sheet_name)
                .map_err(|err| ReadWorkbookError::InvalidSheet {
                    sheet: sheet_name.clone(),
                    message: err.to_string(),
                })?;
        let table =
            derive_table_from_range(&range).map_err(|message| ReadWorkbookError::InvalidSheet {
                sheet: sheet_name.clone(),
                message,
            })?;
        debug!(
            sheet = %sheet_name,
            rows = table.height(),
            cols = table.width(),
            "loaded sheet"
        );
        l_sheets.push((sheet_name, table));
    }

    SpecWorkbook::new(l_sheets).map_err(ReadWorkbookError::Unreadable)
}

/// Convert one calamine range into a table, header from the first row.
pub fn derive_table_from_range(range: &Range<Data>) -> Result<SpecTable, String> {
    if range.is_empty() {
        return SpecTable::new(vec![], vec![]);
    }
    let mut iter_rows = range.rows();
    let Some(row_header) = iter_rows.next() else {
        return SpecTable::new(vec![], vec![]);
    };

    let l_columns = derive_header_names(row_header);
    let l_rows = iter_rows
        .map(|row| row.iter().map(convert_data_to_cell_value).collect())
        .collect();
    SpecTable::new(l_columns, l_rows)
}

fn derive_header_names(row_header: &[Data]) -> Vec<String> {
    let l_raw = row_header
        .iter()
        .enumerate()
        .map(|(n_idx, cell)| {
            let c_name = convert_data_to_cell_value(cell).display_text();
            if c_name.is_empty() {
                format!("{C_HEADER_UNNAMED_PREFIX}{n_idx}")
            } else {
                c_name
            }
        })
        .collect();
    derive_deduplicated_names(l_raw)
}

/// Map one codec cell onto the typed cell model.
///
/// Error cells and non-finite numbers load as missing; durations load as
/// their numeric day count.
pub fn convert_data_to_cell_value(cell: &Data) -> EnumCellValue {
    match cell {
        Data::Empty | Data::Error(_) => EnumCellValue::Missing,
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Float(val) => {
            if val.is_finite() {
                EnumCellValue::Number(*val)
            } else {
                EnumCellValue::Missing
            }
        }
        Data::String(val) => {
            if val.is_empty() {
                EnumCellValue::Missing
            } else {
                EnumCellValue::Text(val.clone())
            }
        }
        Data::Bool(val) => EnumCellValue::Bool(*val),
        Data::DateTime(val) => {
            if val.is_duration() {
                return EnumCellValue::Number(val.as_f64());
            }
            match val.as_datetime() {
                Some(dt) => EnumCellValue::DateTime(dt),
                None => EnumCellValue::Number(val.as_f64()),
            }
        }
        Data::DateTimeIso(val) => match parse_iso_datetime(val) {
            Some(dt) => EnumCellValue::DateTime(dt),
            None => EnumCellValue::Text(val.clone()),
        },
        Data::DurationIso(val) => EnumCellValue::Text(val.clone()),
    }
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
