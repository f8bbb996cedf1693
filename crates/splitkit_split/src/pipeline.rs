//! Load -> partition -> export -> package orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use splitkit_io_fs::{SpecWorkdir, create_zip_archive};
use splitkit_io_xlsx::{SpecWorkbook, read_workbook_from_bytes};
use tracing::{info, warn};

use crate::cache::{SpecCacheStats, SplitCache, derive_content_fingerprint};
use crate::export::{export_all, plan_split};
use crate::report::{EnumArchiveStatus, ReportSplit, ReportSplitBuilder};
use crate::spec::{CancelToken, EnumSplitStage, SpecSplitOptions, SpecSplitPlan, SplitError};

/// Outputs of one split run.
///
/// Owns the working directory; dropping it removes every output file and
/// the archive.
#[derive(Debug)]
pub struct SpecSplitOutput {
    report: ReportSplit,
    workdir: SpecWorkdir,
}

impl SpecSplitOutput {
    /// Run report.
    pub fn report(&self) -> &ReportSplit {
        &self.report
    }

    /// Working directory holding the outputs.
    pub fn path_dir(&self) -> &Path {
        self.workdir.path()
    }

    /// Per-value output files, in value order.
    pub fn files(&self) -> Vec<&Path> {
        self.report
            .values
            .iter()
            .map(|summary| summary.path_file.as_path())
            .collect()
    }

    /// Archive path, when one was created.
    pub fn path_archive(&self) -> Option<&Path> {
        match &self.report.archive {
            EnumArchiveStatus::Created { path_archive, .. } => Some(path_archive.as_path()),
            _ => None,
        }
    }

    /// Archive path, or why there is none.
    pub fn require_archive(&self) -> Result<&Path, SplitError> {
        match &self.report.archive {
            EnumArchiveStatus::Created { path_archive, .. } => Ok(path_archive.as_path()),
            EnumArchiveStatus::Failed(message) => Err(SplitError::Packaging(message.clone())),
            EnumArchiveStatus::Skipped => Err(SplitError::Packaging(
                "No files were exported; nothing to bundle.".to_string(),
            )),
            EnumArchiveStatus::NotRequested => Err(SplitError::Packaging(
                "Archive creation is disabled.".to_string(),
            )),
        }
    }
}

/// Splits uploaded workbooks by a column's distinct values.
///
/// Safe to share across threads; each call owns its own working directory
/// and only the memo cache is shared.
pub struct Splitter {
    options: SpecSplitOptions,
    cache: SplitCache,
}

impl Splitter {
    /// Validate `options` and build a splitter with an empty cache.
    pub fn new(options: SpecSplitOptions) -> Result<Self, SplitError> {
        options.validate()?;
        let cache = SplitCache::new(options.cache_workbooks_max, options.cache_plans_max);
        Ok(Self { options, cache })
    }

    /// Options this splitter was built with.
    pub fn options(&self) -> &SpecSplitOptions {
        &self.options
    }

    /// Hit/miss counters of the shared memo cache.
    pub fn cache_stats(&self) -> SpecCacheStats {
        self.cache.stats()
    }

    /// Parse `v_bytes`, reusing a cached workbook with the same content.
    pub fn load_workbook(&self, v_bytes: &[u8]) -> Result<Arc<SpecWorkbook>, SplitError> {
        self.load_with_fingerprint(&derive_content_fingerprint(v_bytes), v_bytes)
    }

    /// Sorted union of column names across sheets.
    pub fn list_columns(&self, v_bytes: &[u8]) -> Result<Vec<String>, SplitError> {
        Ok(self.load_workbook(v_bytes)?.column_names_union())
    }

    /// Partition plan for `column`, without touching the filesystem.
    pub fn plan(&self, v_bytes: &[u8], column: &str) -> Result<Arc<SpecSplitPlan>, SplitError> {
        let c_fingerprint = derive_content_fingerprint(v_bytes);
        let workbook = self.load_with_fingerprint(&c_fingerprint, v_bytes)?;
        Ok(self
            .cache
            .get_or_plan(&c_fingerprint, column, || plan_split(&workbook, column)))
    }

    /// Split `v_bytes` by `column` into one workbook per distinct value.
    ///
    /// Unreadable input and cancellation abort the run and leave nothing on
    /// disk. Per-value export failures are recorded in the report while the
    /// other values proceed. Packaging failures only mark the archive as
    /// failed.
    pub fn split_bytes(
        &self,
        v_bytes: &[u8],
        column: &str,
        cancel: &CancelToken,
    ) -> Result<SpecSplitOutput, SplitError> {
        let c_fingerprint = derive_content_fingerprint(v_bytes);
        let workbook = self.load_with_fingerprint(&c_fingerprint, v_bytes)?;
        info!(
            stage = %EnumSplitStage::Load,
            sheets = workbook.len(),
            fingerprint = %c_fingerprint,
            "loaded workbook"
        );
        ensure_not_cancelled(cancel)?;

        let plan = self
            .cache
            .get_or_plan(&c_fingerprint, column, || plan_split(&workbook, column));
        info!(
            stage = %EnumSplitStage::Partition,
            column,
            values = plan.partitions.len(),
            "partitioned workbook"
        );
        ensure_not_cancelled(cancel)?;

        let workdir = SpecWorkdir::create(self.options.path_dir_work_parent.as_deref())?;
        self.export_plan(&plan, workdir, cancel)
    }

    fn export_plan(
        &self,
        plan: &SpecSplitPlan,
        workdir: SpecWorkdir,
        cancel: &CancelToken,
    ) -> Result<SpecSplitOutput, SplitError> {
        let column = plan.column.as_str();
        let mut builder = ReportSplitBuilder::new(column);

        if plan.is_empty() {
            let c_warning = if plan.sheets_with_column.is_empty() {
                format!("No sheet contains column {column:?}.")
            } else {
                format!("Column {column:?} has no non-missing values.")
            };
            info!("{c_warning}");
            builder.add_warning(c_warning);
            if self.options.if_create_archive {
                builder.set_archive(EnumArchiveStatus::Skipped);
            }
            return Ok(SpecSplitOutput {
                report: builder.build(),
                workdir,
            });
        }

        let batch = export_all(&plan.partitions, workdir.path(), &self.options, cancel);
        ensure_not_cancelled(cancel)?;
        for c_warning in batch.warnings {
            builder.add_warning(c_warning);
        }
        let mut l_paths: Vec<PathBuf> = Vec::with_capacity(plan.partitions.len());
        for (partition, res_export) in plan.partitions.iter().zip(batch.results) {
            match res_export {
                Ok(export) => {
                    l_paths.push(export.path_file.clone());
                    builder.add_export(
                        partition.value.clone(),
                        partition.file_name.clone(),
                        export.path_file,
                        export.sheets,
                    );
                }
                Err(e) => {
                    warn!(stage = %EnumSplitStage::Export, "{e}");
                    builder.add_failure(
                        partition.value.clone(),
                        EnumSplitStage::Export,
                        e.to_string(),
                    );
                }
            }
        }

        if self.options.if_create_archive {
            let n_failed = plan.partitions.len() - l_paths.len();
            builder.set_archive(self.package(&l_paths, n_failed, &workdir));
        }
        ensure_not_cancelled(cancel)?;

        let report = builder.build();
        info!("{report}");
        Ok(SpecSplitOutput { report, workdir })
    }

    fn load_with_fingerprint(
        &self,
        c_fingerprint: &str,
        v_bytes: &[u8],
    ) -> Result<Arc<SpecWorkbook>, SplitError> {
        self.cache
            .get_or_load_workbook(c_fingerprint, || read_workbook_from_bytes(v_bytes))
            .map_err(SplitError::from)
    }

    fn package(
        &self,
        l_paths: &[PathBuf],
        n_failed: usize,
        workdir: &SpecWorkdir,
    ) -> EnumArchiveStatus {
        let c_message = if l_paths.is_empty() {
            Some("No files were exported; nothing to bundle.".to_string())
        } else if n_failed > 0 {
            Some(format!(
                "{n_failed} value(s) failed to export; refusing to build an incomplete archive."
            ))
        } else {
            None
        };
        if let Some(c_message) = c_message {
            warn!(stage = %EnumSplitStage::Package, "{c_message}");
            return EnumArchiveStatus::Failed(c_message);
        }

        let path_archive = workdir.join(&self.options.archive_file_name);
        match create_zip_archive(l_paths, &path_archive, &self.options.archive_options) {
            Ok(report_archive) => {
                info!(stage = %EnumSplitStage::Package, "{report_archive}");
                EnumArchiveStatus::Created {
                    n_entries: report_archive.entry_count(),
                    path_archive: report_archive.path_archive,
                }
            }
            Err(e) => {
                warn!(stage = %EnumSplitStage::Package, "{e}");
                EnumArchiveStatus::Failed(e.to_string())
            }
        }
    }
}

fn ensure_not_cancelled(cancel: &CancelToken) -> Result<(), SplitError> {
    if cancel.is_cancelled() {
        info!("split cancelled");
        return Err(SplitError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs::File;

    use chrono::NaiveDate;
    use rust_xlsxwriter::{Format, Workbook};
    use splitkit_io_xlsx::{EnumCellValue, ReadWorkbookError};
    use zip::ZipArchive;

    use super::*;
    use crate::partition::{collect_distinct_values, count_rows_with_value};

    fn text(s: &str) -> EnumCellValue {
        EnumCellValue::Text(s.to_string())
    }

    /// Orders: A, A, B, blank, 5 (number). Notes: A, B, B, "5", C. Misc: no id.
    fn build_fixture_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let fmt_date = Format::new().set_num_format("yyyy-mm-dd hh:mm");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Orders").unwrap();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(0, 1, "qty").unwrap();
        sheet.write_string(0, 2, "when").unwrap();
        for (n_row, c_id, n_qty) in [(1, "A", 1.0), (2, "A", 2.0), (3, "B", 3.0)] {
            sheet.write_string(n_row, 0, c_id).unwrap();
            sheet.write_number(n_row, 1, n_qty).unwrap();
            sheet
                .write_datetime_with_format(n_row, 2, &dt, &fmt_date)
                .unwrap();
        }
        sheet.write_number(4, 1, 4.0).unwrap();
        sheet.write_number(5, 0, 5.0).unwrap();
        sheet.write_number(5, 1, 5.0).unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Notes").unwrap();
        sheet.write_string(0, 0, "note").unwrap();
        sheet.write_string(0, 1, "id").unwrap();
        for (n_row, c_note, c_id) in [
            (1, "x", "A"),
            (2, "y", "B"),
            (3, "z", "B"),
            (4, "w", "5"),
            (5, "v", "C"),
        ] {
            sheet.write_string(n_row, 0, c_note).unwrap();
            sheet.write_string(n_row, 1, c_id).unwrap();
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name("Misc").unwrap();
        sheet.write_string(0, 0, "other").unwrap();
        sheet.write_string(1, 0, "A").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    fn build_splitter(path_dir_parent: &Path) -> Splitter {
        Splitter::new(SpecSplitOptions {
            num_workers_max: Some(2),
            path_dir_work_parent: Some(path_dir_parent.to_path_buf()),
            ..SpecSplitOptions::default()
        })
        .unwrap()
    }

    fn read_output(path_file: &Path) -> SpecWorkbook {
        read_workbook_from_bytes(&std::fs::read(path_file).unwrap()).unwrap()
    }

    #[test]
    fn split_bytes_writes_one_file_per_distinct_value() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let v_bytes = build_fixture_bytes();
        let output = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        let report = output.report();

        let l_names: Vec<&str> = report
            .values
            .iter()
            .map(|summary| summary.file_name.as_str())
            .collect();
        assert_eq!(
            l_names,
            ["5.xlsx", "5__2.xlsx", "A.xlsx", "B.xlsx", "C.xlsx"]
        );
        assert_eq!(report.failure_count(), 0);
        assert_eq!(output.files().len(), 5);
        for path_file in output.files() {
            assert!(path_file.starts_with(output.path_dir()));
            assert!(path_file.is_file());
        }

        let workbook = splitter.load_workbook(&v_bytes).unwrap();
        assert_eq!(report.file_count(), collect_distinct_values(&workbook, "id").len());
    }

    #[test]
    fn split_bytes_conserves_rows_per_sheet() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let v_bytes = build_fixture_bytes();
        let output = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        let workbook = splitter.load_workbook(&v_bytes).unwrap();

        for (sheet_name, table) in workbook.iter() {
            let n_rows_exported: usize = output
                .report()
                .to_count_rows()
                .iter()
                .filter(|(_, c_sheet, _)| c_sheet == sheet_name)
                .map(|(_, _, n_rows)| n_rows)
                .sum();
            assert_eq!(n_rows_exported, count_rows_with_value(table, "id"), "{sheet_name}");
        }
        assert_eq!(output.report().total_rows(), 9);
    }

    #[test]
    fn split_bytes_outputs_are_pure_and_omit_unmatched_sheets() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();

        for summary in &output.report().values {
            let workbook_out = read_output(&summary.path_file);
            let l_sheets_expected: Vec<String> = summary
                .sheets
                .iter()
                .map(|count| count.sheet_name.clone())
                .collect();
            assert_eq!(workbook_out.sheet_names(), l_sheets_expected);
            for (_, table) in workbook_out.iter() {
                let n_idx_col = table.column_index("id").unwrap();
                assert!(
                    table
                        .rows()
                        .iter()
                        .all(|row| row[n_idx_col] == summary.value)
                );
            }
        }

        let summary_c = &output.report().values[4];
        assert_eq!(summary_c.value, text("C"));
        assert_eq!(read_output(&summary_c.path_file).sheet_names(), ["Notes"]);
    }

    #[test]
    fn split_bytes_exports_disjoint_row_sets() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();

        let mut set_rows_seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut n_rows_seen = 0usize;
        for summary in &output.report().values {
            for (sheet_name, table) in read_output(&summary.path_file).iter() {
                let c_key_col = if sheet_name == "Orders" { "qty" } else { "note" };
                let n_idx_key = table.column_index(c_key_col).unwrap();
                for row in table.rows() {
                    let c_key = row[n_idx_key].display_text();
                    set_rows_seen.insert((sheet_name.to_string(), c_key));
                    n_rows_seen += 1;
                }
            }
        }
        assert_eq!(n_rows_seen, 9);
        assert_eq!(set_rows_seen.len(), n_rows_seen);
    }

    #[test]
    fn split_bytes_orders_and_notes_example() {
        let mut workbook = Workbook::new();
        for (c_sheet, l_ids) in [("Orders", ["A", "A", "B"]), ("Notes", ["A", "B", "B"])] {
            let sheet = workbook.add_worksheet();
            sheet.set_name(c_sheet).unwrap();
            sheet.write_string(0, 0, "id").unwrap();
            for (n_row, c_id) in (1u32..).zip(l_ids) {
                sheet.write_string(n_row, 0, c_id).unwrap();
            }
        }
        let v_bytes = workbook.save_to_buffer().unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        let l_expected = [
            ("A".to_string(), "Orders".to_string(), 2),
            ("A".to_string(), "Notes".to_string(), 1),
            ("B".to_string(), "Orders".to_string(), 1),
            ("B".to_string(), "Notes".to_string(), 2),
        ];
        assert_eq!(output.report().to_count_rows(), l_expected);

        let archive =
            ZipArchive::new(File::open(output.require_archive().unwrap()).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn split_bytes_keeps_number_and_text_values_apart() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();
        let l_values: Vec<EnumCellValue> = output
            .report()
            .values
            .iter()
            .map(|summary| summary.value.clone())
            .collect();
        assert_eq!(&l_values[..2], [EnumCellValue::Number(5.0), text("5")]);

        let workbook_num = read_output(&output.report().values[0].path_file);
        assert_eq!(workbook_num.sheet_names(), ["Orders"]);
        let workbook_txt = read_output(&output.report().values[1].path_file);
        assert_eq!(workbook_txt.sheet_names(), ["Notes"]);
    }

    #[test]
    fn split_bytes_excludes_missing_and_normalizes_dates() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();

        let mut set_qty = BTreeSet::new();
        for summary in &output.report().values {
            if let Some(table) = read_output(&summary.path_file).get("Orders") {
                let n_idx_qty = table.column_index("qty").unwrap();
                for row in table.rows() {
                    if let EnumCellValue::Number(n) = row[n_idx_qty] {
                        set_qty.insert(n as i64);
                    }
                }
            }
        }
        assert_eq!(set_qty, BTreeSet::from([1, 2, 3, 5]));

        let table_a = read_output(&output.report().values[2].path_file)
            .get("Orders")
            .cloned()
            .unwrap();
        let dt_midnight = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(table_a.rows()[0][2], EnumCellValue::DateTime(dt_midnight));
    }

    #[test]
    fn split_bytes_is_idempotent_and_served_from_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let v_bytes = build_fixture_bytes();

        let output_a = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        let output_b = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        assert_ne!(output_a.path_dir(), output_b.path_dir());
        assert_eq!(
            output_a.report().to_count_rows(),
            output_b.report().to_count_rows()
        );
        assert_eq!(
            output_a.report().render_table().lines().next(),
            output_b.report().render_table().lines().next()
        );

        let stats = splitter.cache_stats();
        assert_eq!(stats.cnt_workbook_misses, 1);
        assert_eq!(stats.cnt_workbook_hits, 1);
        assert_eq!(stats.cnt_plan_misses, 1);
        assert_eq!(stats.cnt_plan_hits, 1);
    }

    #[test]
    fn split_bytes_bundles_every_file_into_the_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();

        let path_archive = output.require_archive().unwrap();
        assert_eq!(path_archive, output.path_dir().join("filtered_files.zip"));
        let archive = ZipArchive::new(File::open(path_archive).unwrap()).unwrap();
        let set_entries: BTreeSet<&str> = archive.file_names().collect();
        assert_eq!(
            set_entries,
            BTreeSet::from(["5.xlsx", "5__2.xlsx", "A.xlsx", "B.xlsx", "C.xlsx"])
        );
        assert!(output.report().to_string().ends_with("archive=created"));
    }

    #[test]
    fn split_bytes_without_matching_column_produces_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "region", &CancelToken::new())
            .unwrap();

        assert_eq!(output.report().file_count(), 0);
        assert_eq!(output.report().archive, EnumArchiveStatus::Skipped);
        assert!(output.path_archive().is_none());
        assert!(output.require_archive().is_err());
        assert_eq!(std::fs::read_dir(output.path_dir()).unwrap().count(), 0);
        assert_eq!(
            output.report().warnings,
            ["No sheet contains column \"region\"."]
        );
    }

    #[test]
    fn split_bytes_rejects_unreadable_input() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let err = splitter
            .split_bytes(b"not a workbook", "id", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            SplitError::UnreadableWorkbook(ReadWorkbookError::Unreadable(_))
        ));
        assert!(err.to_string().starts_with("[load]"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn split_bytes_cancellation_leaves_no_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = splitter
            .split_bytes(&build_fixture_bytes(), "id", &cancel)
            .unwrap_err();
        assert!(matches!(err, SplitError::Cancelled));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn split_output_drop_removes_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();
        let path_dir = output.path_dir().to_path_buf();
        assert!(path_dir.is_dir());
        drop(output);
        assert!(!path_dir.exists());
    }

    fn build_workdir(path_dir_parent: &Path) -> SpecWorkdir {
        SpecWorkdir::create(Some(path_dir_parent)).unwrap()
    }

    #[test]
    fn split_bytes_exports_long_multibyte_values() {
        let c_long = "日".repeat(120);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(1, 0, "A").unwrap();
        sheet.write_string(2, 0, &c_long).unwrap();
        let v_bytes = workbook.save_to_buffer().unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let output = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        let report = output.report();
        assert_eq!(report.failure_count(), 0, "{:?}", report.failures);
        assert_eq!(report.file_count(), 2);
        assert_eq!(report.values[1].value, text(&c_long));
        assert!(report.values[1].path_file.is_file());
        assert!(matches!(
            report.archive,
            EnumArchiveStatus::Created { n_entries: 2, .. }
        ));
    }

    #[test]
    fn export_failure_keeps_other_values_and_fails_the_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let plan = splitter.plan(&build_fixture_bytes(), "id").unwrap();
        let workdir = build_workdir(tmp.path());
        std::fs::create_dir(workdir.join("C.xlsx")).unwrap();

        let output = splitter
            .export_plan(&plan, workdir, &CancelToken::new())
            .unwrap();
        let report = output.report();
        assert_eq!(report.file_count(), 4);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failures[0].value, text("C"));
        assert_eq!(report.failures[0].stage, EnumSplitStage::Export);
        for path_file in output.files() {
            assert!(path_file.is_file());
        }

        assert!(matches!(report.archive, EnumArchiveStatus::Failed(_)));
        assert!(output.path_archive().is_none());
        assert!(!output.path_dir().join("filtered_files.zip").exists());
        let err = output.require_archive().unwrap_err();
        assert!(matches!(
            err,
            SplitError::Packaging(ref message) if message.contains("1 value(s)")
        ));
    }

    #[test]
    fn export_failure_for_every_value_still_returns_a_report() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = SpecSplitOptions {
            path_dir_work_parent: Some(tmp.path().to_path_buf()),
            ..SpecSplitOptions::default()
        };
        options.write_options.policy_autofit.width_cell_max = 0;
        let splitter = Splitter::new(options).unwrap();

        let output = splitter
            .split_bytes(&build_fixture_bytes(), "id", &CancelToken::new())
            .unwrap();
        assert_eq!(output.report().file_count(), 0);
        assert_eq!(output.report().failure_count(), 5);
        assert!(matches!(
            output.require_archive(),
            Err(SplitError::Packaging(_))
        ));
        assert_eq!(std::fs::read_dir(output.path_dir()).unwrap().count(), 0);
    }

    #[test]
    fn packaging_failure_only_marks_the_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        let plan = splitter.plan(&build_fixture_bytes(), "id").unwrap();
        let workdir = build_workdir(tmp.path());
        std::fs::create_dir(workdir.join("filtered_files.zip")).unwrap();

        let output = splitter
            .export_plan(&plan, workdir, &CancelToken::new())
            .unwrap();
        let report = output.report();
        assert_eq!(report.failure_count(), 0);
        assert_eq!(report.file_count(), 5);
        for path_file in output.files() {
            assert!(path_file.is_file());
        }
        assert!(matches!(
            report.archive,
            EnumArchiveStatus::Failed(ref message) if message.starts_with("Packaging failed")
        ));
        assert!(matches!(
            output.require_archive(),
            Err(SplitError::Packaging(_))
        ));
        assert!(report.to_string().ends_with("archive=failed"));
    }

    #[test]
    fn splitter_lists_columns_and_validates_options() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = build_splitter(tmp.path());
        assert_eq!(
            splitter.list_columns(&build_fixture_bytes()).unwrap(),
            ["id", "note", "other", "qty", "when"]
        );

        let err = Splitter::new(SpecSplitOptions {
            archive_file_name: "../out.zip".to_string(),
            ..SpecSplitOptions::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, SplitError::InvalidOptions(_)));
        assert!(
            Splitter::new(SpecSplitOptions {
                archive_file_name: "out.tar".to_string(),
                ..SpecSplitOptions::default()
            })
            .is_err()
        );
    }

    #[test]
    fn splitter_without_archive_reports_off() {
        let tmp = tempfile::tempdir().unwrap();
        let splitter = Splitter::new(SpecSplitOptions {
            path_dir_work_parent: Some(tmp.path().to_path_buf()),
            if_create_archive: false,
            cache_workbooks_max: 0,
            cache_plans_max: 0,
            ..SpecSplitOptions::default()
        })
        .unwrap();
        let v_bytes = build_fixture_bytes();
        let output = splitter
            .split_bytes(&v_bytes, "id", &CancelToken::new())
            .unwrap();
        assert_eq!(output.report().archive, EnumArchiveStatus::NotRequested);
        assert_eq!(output.files().len(), 5);

        let plan = splitter.plan(&v_bytes, "id").unwrap();
        assert_eq!(plan.partitions.len(), 5);
        assert_eq!(splitter.cache_stats().cnt_plan_hits, 0);
    }
}
