//! Shared table/workbook models, writer options and errors.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::conf::{C_FMT_DATE, C_FMT_DATETIME};
use crate::util::validate_unique_names;

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Typed scalar held by one table cell.
///
/// Equality is strict per variant: a `Number(5.0)` never equals `Text("5")`.
#[derive(Debug, Clone)]
pub enum EnumCellValue {
    /// Missing/blank value.
    Missing,
    /// Numeric value (always finite).
    Number(f64),
    /// Text value (never empty).
    Text(String),
    /// Boolean value.
    Bool(bool),
    /// Date-only value, produced by temporal normalization.
    Date(NaiveDate),
    /// Date+time value.
    DateTime(NaiveDateTime),
}

impl EnumCellValue {
    /// Whether the cell is missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Whether the cell holds a date or date+time.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date(_) | Self::DateTime(_))
    }

    /// Stringified form used for file names and width estimation.
    pub fn display_text(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Number(n) => normalize_zero(*n).to_string(),
            Self::Text(s) => s.clone(),
            Self::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Self::Date(d) => d.format(C_FMT_DATE).to_string(),
            Self::DateTime(dt) => dt.format(C_FMT_DATETIME).to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
            Self::Bool(_) => 3,
            Self::Date(_) => 4,
            Self::DateTime(_) => 5,
        }
    }
}

fn normalize_zero(n: f64) -> f64 {
    if n == 0.0 { 0.0 } else { n }
}

impl PartialEq for EnumCellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Missing, Self::Missing) => true,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

// NaN never enters the model, so numeric equality is reflexive.
impl Eq for EnumCellValue {}

impl Hash for EnumCellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Missing => {}
            Self::Number(n) => normalize_zero(*n).to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Date(d) => d.hash(state),
            Self::DateTime(dt) => dt.hash(state),
        }
    }
}

impl Ord for EnumCellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => normalize_zero(*a).total_cmp(&normalize_zero(*b)),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for EnumCellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Inferred column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumColumnKind {
    /// No non-missing cells.
    #[default]
    Empty,
    /// Only numbers.
    Number,
    /// Only text.
    Text,
    /// Only booleans.
    Bool,
    /// Only dates and date+times.
    Temporal,
    /// More than one of the above.
    Mixed,
}

impl EnumColumnKind {
    fn from_cell(value: &EnumCellValue) -> Self {
        match value {
            EnumCellValue::Missing => Self::Empty,
            EnumCellValue::Number(_) => Self::Number,
            EnumCellValue::Text(_) => Self::Text,
            EnumCellValue::Bool(_) => Self::Bool,
            EnumCellValue::Date(_) | EnumCellValue::DateTime(_) => Self::Temporal,
        }
    }

    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, kind) | (kind, Self::Empty) => kind,
            (a, b) if a == b => a,
            _ => Self::Mixed,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableAndWorkbook

/// Rows x named columns of typed cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTable {
    columns: Vec<String>,
    kinds: Vec<EnumColumnKind>,
    rows: Vec<Vec<EnumCellValue>>,
}

impl SpecTable {
    /// Build a table and infer column kinds.
    ///
    /// Column names must be unique and every row must be exactly as wide as
    /// the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<EnumCellValue>>) -> Result<Self, String> {
        validate_unique_names(&columns, "column")?;
        if let Some((n_idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(format!(
                "Row {n_idx} has {} cells; expected {}.",
                row.len(),
                columns.len()
            ));
        }

        let mut kinds = vec![EnumColumnKind::Empty; columns.len()];
        for row in &rows {
            for (kind, value) in kinds.iter_mut().zip(row) {
                *kind = kind.combine(EnumColumnKind::from_cell(value));
            }
        }

        Ok(Self {
            columns,
            kinds,
            rows,
        })
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order.
    pub fn rows(&self) -> &[Vec<EnumCellValue>] {
        &self.rows
    }

    /// Number of body rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of `name`, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c_name| c_name == name)
    }

    /// Inferred kind of column `idx`.
    pub fn column_kind(&self, idx: usize) -> Option<EnumColumnKind> {
        self.kinds.get(idx).copied()
    }

    /// Keep rows matching `predicate`.
    ///
    /// Column kinds are carried over from `self`, so a date column stays
    /// temporal even when the surviving rows are all blank.
    pub fn filter_rows<F>(&self, predicate: F) -> SpecTable
    where
        F: Fn(&[EnumCellValue]) -> bool,
    {
        SpecTable {
            columns: self.columns.clone(),
            kinds: self.kinds.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row))
                .cloned()
                .collect(),
        }
    }

    /// Keep rows at `indices`, in the given order; out-of-range indices are
    /// skipped. Kinds are carried over like [`SpecTable::filter_rows`].
    pub fn select_rows(&self, indices: &[usize]) -> SpecTable {
        SpecTable {
            columns: self.columns.clone(),
            kinds: self.kinds.clone(),
            rows: indices
                .iter()
                .filter_map(|&n_idx| self.rows.get(n_idx).cloned())
                .collect(),
        }
    }

    /// Rewrite every cell of column `idx` in place.
    pub fn map_column<F>(&mut self, idx: usize, f: F)
    where
        F: Fn(&EnumCellValue) -> EnumCellValue,
    {
        if idx >= self.columns.len() {
            return;
        }
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }
}

/// Ordered collection of uniquely named sheets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbook {
    sheets: Vec<(String, SpecTable)>,
}

impl SpecWorkbook {
    /// Build a workbook; sheet names must be unique.
    pub fn new(sheets: Vec<(String, SpecTable)>) -> Result<Self, String> {
        let l_names: Vec<String> = sheets.iter().map(|(name, _)| name.clone()).collect();
        validate_unique_names(&l_names, "sheet")?;
        Ok(Self { sheets })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Look up one sheet by name.
    pub fn get(&self, name: &str) -> Option<&SpecTable> {
        self.sheets
            .iter()
            .find(|(c_name, _)| c_name == name)
            .map(|(_, table)| table)
    }

    /// Iterate `(sheet name, table)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpecTable)> {
        self.sheets.iter().map(|(name, table)| (name.as_str(), table))
    }

    /// Number of sheets.
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Whether the workbook has no sheets.
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Sorted union of column names across all sheets.
    pub fn column_names_union(&self) -> Vec<String> {
        self.sheets
            .iter()
            .flat_map(|(_, table)| table.columns().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format overlay; `None` fields inherit from the base format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Bold style.
    pub bold: Option<bool>,
    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy for per-sheet write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            width_cell_padding: 2,
            width_cell_max: crate::conf::N_WIDTH_EXCEL_COLUMN_MAX,
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Freeze the header row.
    pub if_freeze_header: bool,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            policy_autofit: SpecAutofitCellsPolicy::default(),
            if_freeze_header: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportAndErrors

/// Per-sheet write report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetReport {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Body rows written.
    pub n_rows: usize,
    /// Final column widths (empty when autofit is disabled).
    pub widths_by_col: Vec<usize>,
}

/// Workbook load failure.
#[derive(Debug, Error)]
pub enum ReadWorkbookError {
    /// Bytes are not a workbook the codec understands.
    #[error("Unreadable workbook: {0}")]
    Unreadable(String),
    /// Workbook parsed but has no sheets.
    #[error("Unreadable workbook: no sheets found")]
    NoSheets,
    /// One sheet could not be turned into a table.
    #[error("Unreadable workbook: sheet {sheet:?}: {message}")]
    InvalidSheet {
        /// Offending sheet name.
        sheet: String,
        /// Underlying failure text.
        message: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
