//! Distinct value discovery over a split column.

use std::collections::BTreeSet;

use splitkit_io_xlsx::{EnumCellValue, SpecTable, SpecWorkbook};
use tracing::debug;

/// Sorted distinct non-missing values of `column` across every sheet.
///
/// Sheets without the column are skipped; the result is empty when no sheet
/// has it or every cell is missing. Values are type-strict, so `5` and `"5"`
/// are both kept.
pub fn collect_distinct_values(workbook: &SpecWorkbook, column: &str) -> Vec<EnumCellValue> {
    let mut set_values: BTreeSet<EnumCellValue> = BTreeSet::new();
    for (sheet_name, table) in workbook.iter() {
        let Some(n_idx_col) = table.column_index(column) else {
            continue;
        };
        let n_before = set_values.len();
        set_values.extend(
            table
                .rows()
                .iter()
                .map(|row| &row[n_idx_col])
                .filter(|value| !value.is_missing())
                .cloned(),
        );
        debug!(
            sheet = sheet_name,
            column,
            new_values = set_values.len() - n_before,
            "scanned split column"
        );
    }
    set_values.into_iter().collect()
}

/// Sheets that contain `column`, in workbook order.
pub fn list_sheets_with_column(workbook: &SpecWorkbook, column: &str) -> Vec<String> {
    workbook
        .iter()
        .filter(|(_, table)| table.column_index(column).is_some())
        .map(|(sheet_name, _)| sheet_name.to_string())
        .collect()
}

/// Rows of `table` whose `column` cell is not missing; 0 without the column.
pub fn count_rows_with_value(table: &SpecTable, column: &str) -> usize {
    let Some(n_idx_col) = table.column_index(column) else {
        return 0;
    };
    table
        .rows()
        .iter()
        .filter(|row| !row[n_idx_col].is_missing())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> EnumCellValue {
        EnumCellValue::Text(s.to_string())
    }

    fn build_workbook() -> SpecWorkbook {
        let orders = SpecTable::new(
            vec!["id".to_string(), "qty".to_string()],
            vec![
                vec![text("B"), EnumCellValue::Number(1.0)],
                vec![EnumCellValue::Number(5.0), EnumCellValue::Number(2.0)],
                vec![EnumCellValue::Missing, EnumCellValue::Number(3.0)],
            ],
        )
        .unwrap();
        let notes = SpecTable::new(
            vec!["note".to_string(), "id".to_string()],
            vec![
                vec![text("x"), text("5")],
                vec![text("y"), text("B")],
            ],
        )
        .unwrap();
        let misc = SpecTable::new(vec!["other".to_string()], vec![vec![text("B")]]).unwrap();
        SpecWorkbook::new(vec![
            ("Orders".to_string(), orders),
            ("Notes".to_string(), notes),
            ("Misc".to_string(), misc),
        ])
        .unwrap()
    }

    #[test]
    fn collect_distinct_values_is_sorted_type_strict_and_skips_missing() {
        let workbook = build_workbook();
        assert_eq!(
            collect_distinct_values(&workbook, "id"),
            [EnumCellValue::Number(5.0), text("5"), text("B")]
        );
        assert!(collect_distinct_values(&workbook, "absent").is_empty());
    }

    #[test]
    fn list_and_count_follow_column_presence() {
        let workbook = build_workbook();
        assert_eq!(list_sheets_with_column(&workbook, "id"), ["Orders", "Notes"]);
        assert_eq!(
            count_rows_with_value(workbook.get("Orders").unwrap(), "id"),
            2
        );
        assert_eq!(count_rows_with_value(workbook.get("Misc").unwrap(), "id"), 0);
    }
}
