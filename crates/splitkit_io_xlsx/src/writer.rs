//! XLSX writer kernel that renders [`SpecTable`] sheets into workbook bytes.

use std::collections::{BTreeMap, BTreeSet};

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::conf::{
    EnumFmtKey, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    derive_default_xlsx_formats,
};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecSheetReport, SpecTable, SpecXlsxWriteOptions,
};
use crate::util::{estimate_unicode_string_width, estimate_width_len, sanitize_sheet_name};

struct SpecWriterFormats {
    fmt_text: Format,
    fmt_number: Format,
    fmt_date: Format,
    fmt_datetime: Format,
    fmt_header: Format,
}

/// Stateful workbook writer.
///
/// Sheets are buffered in memory until [`Self::save_to_buffer`] is called.
pub struct XlsxWriter {
    workbook: Workbook,
    formats: SpecWriterFormats,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecSheetReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer with the default format presets.
    pub fn new(write_options: SpecXlsxWriteOptions) -> Self {
        Self::with_formats(write_options, &derive_default_xlsx_formats())
    }

    /// Create writer with explicit named presets; missing keys fall back to
    /// an unformatted cell.
    pub fn with_formats(
        write_options: SpecXlsxWriteOptions,
        dict_fmt: &BTreeMap<String, SpecCellFormat>,
    ) -> Self {
        let derive_fmt = |key: EnumFmtKey| {
            dict_fmt
                .get(key.as_str())
                .map(derive_rust_xlsx_format)
                .unwrap_or_default()
        };
        Self {
            workbook: Workbook::new(),
            formats: SpecWriterFormats {
                fmt_text: derive_fmt(EnumFmtKey::Text),
                fmt_number: derive_fmt(EnumFmtKey::Number),
                fmt_date: derive_fmt(EnumFmtKey::Date),
                fmt_datetime: derive_fmt(EnumFmtKey::DateTime),
                fmt_header: derive_fmt(EnumFmtKey::Header),
            },
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecSheetReport> {
        self.l_reports.clone()
    }

    /// Serialize the workbook. The writer rejects further sheets afterwards.
    pub fn save_to_buffer(&mut self) -> Result<Vec<u8>, String> {
        if self.if_closed {
            return Err("Workbook already saved.".to_string());
        }
        let v_bytes = self
            .workbook
            .save_to_buffer()
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        Ok(v_bytes)
    }

    /// Write one sheet: bold header row, typed body cells, autofit widths.
    pub fn write_sheet(
        &mut self,
        table: &SpecTable,
        sheet_name: &str,
    ) -> Result<SpecSheetReport, String> {
        if self.if_closed {
            return Err("Cannot write after save_to_buffer().".to_string());
        }
        validate_policy_autofit(&self.write_options.policy_autofit)?;
        if table.height() + 1 > N_NROWS_EXCEL_MAX {
            return Err(format!(
                "Sheet {sheet_name:?} has {} rows; Excel allows {}.",
                table.height(),
                N_NROWS_EXCEL_MAX - 1
            ));
        }
        if table.width() > N_NCOLS_EXCEL_MAX {
            return Err(format!(
                "Sheet {sheet_name:?} has {} columns; Excel allows {N_NCOLS_EXCEL_MAX}.",
                table.width()
            ));
        }

        let sheet_name_unique = self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name, "_"));
        let policy_autofit = self.write_options.policy_autofit.clone();
        let if_freeze_header = self.write_options.if_freeze_header;

        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name_unique)
            .map_err(derive_xlsx_error_text)?;

        for (n_idx_col, c_name) in table.columns().iter().enumerate() {
            worksheet
                .write_string_with_format(
                    0,
                    cast_col_num(n_idx_col)?,
                    c_name,
                    &self.formats.fmt_header,
                )
                .map_err(derive_xlsx_error_text)?;
        }
        if if_freeze_header && table.width() > 0 {
            worksheet
                .set_freeze_panes(1, 0)
                .map_err(derive_xlsx_error_text)?;
        }

        for (n_idx_row, row) in table.rows().iter().enumerate() {
            for (n_idx_col, value) in row.iter().enumerate() {
                write_cell_with_format(worksheet, n_idx_row + 1, n_idx_col, value, &self.formats)?;
            }
        }

        let widths_by_col = derive_column_widths(table, &policy_autofit);
        for (n_idx_col, n_width) in widths_by_col.iter().enumerate() {
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, *n_width as f64)
                .map_err(derive_xlsx_error_text)?;
        }

        let report = SpecSheetReport {
            sheet_name: sheet_name_unique,
            n_rows: table.height(),
            widths_by_col,
        };
        self.l_reports.push(report.clone());
        Ok(report)
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if !self.set_sheet_names_existing.contains(name) {
            self.set_sheet_names_existing.insert(name.to_string());
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if !self.set_sheet_names_existing.contains(&candidate) {
                self.set_sheet_names_existing.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }
}

/// Column widths: max(header width, widest body cell) + padding.
///
/// Returns an empty list when autofit is disabled.
pub fn derive_column_widths(table: &SpecTable, policy: &SpecAutofitCellsPolicy) -> Vec<usize> {
    if matches!(policy.rule_columns, EnumAutofitColumnsRule::None) {
        return vec![];
    }

    let l_width_by_col_header: Vec<usize> = table
        .columns()
        .iter()
        .map(|c_name| estimate_unicode_string_width(c_name))
        .collect();
    let mut l_width_by_col_body = vec![0usize; table.width()];
    for row in table.rows() {
        for (n_width, value) in l_width_by_col_body.iter_mut().zip(row) {
            *n_width = usize::max(*n_width, estimate_width_len(value));
        }
    }

    l_width_by_col_header
        .into_iter()
        .zip(l_width_by_col_body)
        .map(|(n_header, n_body)| {
            let n_width_recorded = match policy.rule_columns {
                EnumAutofitColumnsRule::Header => n_header,
                EnumAutofitColumnsRule::Body => n_body,
                EnumAutofitColumnsRule::All | EnumAutofitColumnsRule::None => {
                    usize::max(n_header, n_body)
                }
            };
            usize::min(policy.width_cell_max, n_width_recorded + policy.width_cell_padding)
        })
        .collect()
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), String> {
    if policy_autofit.width_cell_max == 0 {
        return Err("policy_autofit.width_cell_max must be >= 1.".to_string());
    }
    if policy_autofit.width_cell_max > crate::conf::N_WIDTH_EXCEL_COLUMN_MAX {
        return Err(format!(
            "policy_autofit.width_cell_max must be <= {}.",
            crate::conf::N_WIDTH_EXCEL_COLUMN_MAX
        ));
    }
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    formats: &SpecWriterFormats,
) -> Result<(), String> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::Missing => {}
        EnumCellValue::Text(val) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, &formats.fmt_text)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Number(val) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, &formats.fmt_number)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Bool(val) => {
            worksheet
                .write_boolean_with_format(n_row, n_col, *val, &formats.fmt_text)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Date(val) => {
            worksheet
                .write_datetime_with_format(n_row, n_col, val, &formats.fmt_date)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::DateTime(val) => {
            worksheet
                .write_datetime_with_format(n_row, n_col, val, &formats.fmt_datetime)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}
