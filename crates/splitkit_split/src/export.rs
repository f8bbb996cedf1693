//! Per-value partitioning and workbook export.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use splitkit_io_fs::{calculate_worker_limit, remove_file_if_exists, write_file_atomic};
use splitkit_io_xlsx::{
    EnumCellValue, EnumColumnKind, SpecTable, SpecWorkbook, SpecXlsxWriteOptions, XlsxWriter,
};
use tracing::{debug, info, warn};

use crate::conf::C_OUTPUT_FILE_EXT;
use crate::partition::{collect_distinct_values, list_sheets_with_column};
use crate::report::SpecSheetCount;
use crate::spec::{
    CancelToken, ExportWriteError, SpecExportBatch, SpecSplitOptions, SpecSplitPlan,
    SpecValueExport, SpecValuePartition,
};
use crate::util::{derive_file_stem, derive_output_file_names};

////////////////////////////////////////////////////////////////////////////////
// #region Planning

/// Rows equal to `value` in `column`, per sheet.
///
/// Sheets lacking the column or with zero matches are omitted. Temporal
/// columns of the filtered tables are normalized to dates; `workbook` itself
/// is never modified. `file_name` defaults to the sanitized value.
pub fn plan_value_partition(
    workbook: &SpecWorkbook,
    column: &str,
    value: &EnumCellValue,
    file_name: Option<String>,
) -> SpecValuePartition {
    let mut l_sheets = Vec::new();
    for (sheet_name, table) in workbook.iter() {
        let Some(n_idx_col) = table.column_index(column) else {
            continue;
        };
        let mut table_part = table.filter_rows(|row| &row[n_idx_col] == value);
        if table_part.height() == 0 {
            continue;
        }
        normalize_temporal_columns(&mut table_part);
        l_sheets.push((sheet_name.to_string(), table_part));
    }
    SpecValuePartition {
        value: value.clone(),
        file_name: file_name
            .unwrap_or_else(|| format!("{}.{C_OUTPUT_FILE_EXT}", derive_file_stem(value))),
        sheets: l_sheets,
    }
}

/// Partition the whole workbook by `column` in one pass per sheet.
///
/// Equivalent to calling [`plan_value_partition`] for every distinct value,
/// with collision-free file names assigned in value order.
pub fn plan_split(workbook: &SpecWorkbook, column: &str) -> SpecSplitPlan {
    let l_values = collect_distinct_values(workbook, column);
    let l_file_names = derive_output_file_names(&l_values);
    let dict_idx_by_value: HashMap<EnumCellValue, usize> = l_values
        .iter()
        .cloned()
        .enumerate()
        .map(|(n_idx, value)| (value, n_idx))
        .collect();
    let mut l_partitions: Vec<SpecValuePartition> = l_values
        .into_iter()
        .zip(l_file_names)
        .map(|(value, file_name)| SpecValuePartition {
            value,
            file_name,
            sheets: Vec::new(),
        })
        .collect();

    for (sheet_name, table) in workbook.iter() {
        let Some(n_idx_col) = table.column_index(column) else {
            continue;
        };
        let mut dict_rows_by_part: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (n_idx_row, row) in table.rows().iter().enumerate() {
            if let Some(&n_idx_part) = dict_idx_by_value.get(&row[n_idx_col]) {
                dict_rows_by_part.entry(n_idx_part).or_default().push(n_idx_row);
            }
        }
        for (n_idx_part, l_rows) in dict_rows_by_part {
            let mut table_part = table.select_rows(&l_rows);
            normalize_temporal_columns(&mut table_part);
            l_partitions[n_idx_part]
                .sheets
                .push((sheet_name.to_string(), table_part));
        }
    }

    let plan = SpecSplitPlan {
        column: column.to_string(),
        sheets_with_column: list_sheets_with_column(workbook, column),
        partitions: l_partitions,
    };
    info!(
        column,
        values = plan.partitions.len(),
        sheets = plan.sheets_with_column.len(),
        "planned split"
    );
    plan
}

/// Turn every `DateTime` of a `Temporal` column into its date.
pub fn normalize_temporal_columns(table: &mut SpecTable) {
    for n_idx_col in 0..table.width() {
        if table.column_kind(n_idx_col) != Some(EnumColumnKind::Temporal) {
            continue;
        }
        table.map_column(n_idx_col, |value| match value {
            EnumCellValue::DateTime(dt) => EnumCellValue::Date(dt.date()),
            other => other.clone(),
        });
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Export

/// Render one partition to xlsx bytes, one sheet per source sheet.
///
/// Also returns the rows written per sheet under the sheet names the writer
/// actually used, which may differ from the source after sanitizing.
pub fn render_value_workbook(
    partition: &SpecValuePartition,
    write_options: &SpecXlsxWriteOptions,
) -> Result<(Vec<u8>, Vec<SpecSheetCount>), String> {
    let mut writer = XlsxWriter::new(write_options.clone());
    let mut l_counts = Vec::with_capacity(partition.sheets.len());
    for (sheet_name, table) in &partition.sheets {
        let report_sheet = writer.write_sheet(table, sheet_name)?;
        debug!(
            file = %partition.file_name,
            sheet = %report_sheet.sheet_name,
            rows = report_sheet.n_rows,
            "rendered sheet"
        );
        l_counts.push(SpecSheetCount {
            sheet_name: report_sheet.sheet_name,
            rows: report_sheet.n_rows,
        });
    }
    Ok((writer.save_to_buffer()?, l_counts))
}

/// Render and atomically commit one partition into `path_dir`.
///
/// Cancellation is checked before rendering and before commit; a file
/// committed after cancellation is removed again. A failed write leaves no
/// readable file behind.
pub fn export_value_partition(
    partition: &SpecValuePartition,
    path_dir: &Path,
    write_options: &SpecXlsxWriteOptions,
    cancel: &CancelToken,
) -> Result<SpecValueExport, ExportWriteError> {
    let derive_cancelled = || ExportWriteError::Cancelled {
        value: partition.value.display_text(),
    };
    let derive_write_err = |message: String| ExportWriteError::Write {
        value: partition.value.display_text(),
        message,
    };

    if cancel.is_cancelled() {
        return Err(derive_cancelled());
    }
    let (v_bytes, l_counts) =
        render_value_workbook(partition, write_options).map_err(derive_write_err)?;
    if cancel.is_cancelled() {
        return Err(derive_cancelled());
    }

    let path_file = path_dir.join(&partition.file_name);
    write_file_atomic(&path_file, &v_bytes).map_err(|e| {
        derive_write_err(format!("Failed to write {}: {e}", path_file.display()))
    })?;
    if cancel.is_cancelled() {
        if let Err(e) = remove_file_if_exists(&path_file) {
            warn!(path = %path_file.display(), "failed to remove cancelled output: {e}");
        }
        return Err(derive_cancelled());
    }

    debug!(
        value = %partition.value.display_text(),
        path = %path_file.display(),
        bytes = v_bytes.len(),
        "exported value"
    );
    Ok(SpecValueExport {
        path_file,
        sheets: l_counts,
    })
}

/// Export every partition into `path_dir` on a bounded worker pool.
///
/// Results keep partition order. One value's failure never stops the
/// others; pool construction failure falls back to serial export.
pub fn export_all(
    partitions: &[SpecValuePartition],
    path_dir: &Path,
    options: &SpecSplitOptions,
    cancel: &CancelToken,
) -> SpecExportBatch {
    let mut batch = SpecExportBatch::default();
    if partitions.is_empty() {
        return batch;
    }
    let n_workers_max = calculate_worker_limit(options.num_workers_max).min(partitions.len());
    let export_one = |partition: &SpecValuePartition| {
        export_value_partition(partition, path_dir, &options.write_options, cancel)
    };

    if n_workers_max <= 1 {
        batch.results = partitions.iter().map(export_one).collect();
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
            Ok(thread_pool) => {
                batch.results =
                    thread_pool.install(|| partitions.par_iter().map(export_one).collect());
            }
            Err(e) => {
                let c_warning = format!(
                    "Failed to initialize thread pool (workers={n_workers_max}): {e}; \
                     fallback to serial export."
                );
                warn!("{c_warning}");
                batch.warnings.push(c_warning);
                batch.results = partitions.iter().map(export_one).collect();
            }
        }
    }

    let n_failed = batch.results.iter().filter(|res| res.is_err()).count();
    info!(
        workers = n_workers_max,
        files = batch.results.len() - n_failed,
        failed = n_failed,
        "exported partitions"
    );
    batch
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
