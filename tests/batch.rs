use std::path::{Path, PathBuf};

use calamine::{Reader, Xlsx, open_workbook};
use sheetclean::CleanError;
use sheetclean::batch::{
    self, AlwaysOverwrite, BatchJob, ConflictResolver, EventSink, FileOutcome, Resolution,
    RunReport, RunStatus,
};
use sheetclean::io::excel_read::read_table;
use sheetclean::io::excel_write::write_table;
use sheetclean::model::{Cell, Table};
use tempfile::tempdir;

fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|v| Cell::Text((*v).to_string())).collect())
            .collect(),
    }
}

fn write_fixture(path: &Path, columns: &[&str], rows: &[&[&str]]) {
    write_table(path, &table(columns, rows)).expect("fixture written");
}

fn column_text(table: &Table, idx: usize) -> Vec<String> {
    table
        .rows
        .iter()
        .map(|row| match &row[idx] {
            Cell::Text(value) => value.clone(),
            other => panic!("expected text cell, got {other:?}"),
        })
        .collect()
}

struct CancelAll;

impl ConflictResolver for CancelAll {
    fn resolve(&mut self, _existing: &Path) -> Resolution {
        Resolution::Cancel
    }
}

struct RenameTo(PathBuf);

impl ConflictResolver for RenameTo {
    fn resolve(&mut self, _existing: &Path) -> Resolution {
        Resolution::Rename(self.0.clone())
    }
}

#[derive(Default)]
struct Recorder {
    progress: Vec<(usize, usize)>,
    status: Option<RunStatus>,
}

impl EventSink for Recorder {
    fn progress(&mut self, done: usize, total: usize) {
        self.progress.push((done, total));
    }

    fn finished(&mut self, report: &RunReport) {
        self.status = Some(report.status());
    }
}

fn job(inputs: Vec<PathBuf>, output_dir: PathBuf) -> BatchJob {
    BatchJob {
        inputs,
        output_dir,
        ..BatchJob::default()
    }
}

#[test]
fn plain_pass_writes_cleaned_copies() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    let b = dir.path().join("b.xlsx");
    write_fixture(&a, &["city"], &[&["la"], &["la"], &["sf"]]);
    write_fixture(&b, &["city"], &[&["oak"], &["napa"]]);

    let out = dir.path().join("out");
    let mut sink = Recorder::default();
    let report = batch::run(&job(vec![a, b], out.clone()), &mut AlwaysOverwrite, &mut sink)
        .expect("batch run");

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.outcomes.len(), 2);

    let a_cleaned = read_table(&out.join("a_cleaned.xlsx")).expect("cleaned copy read");
    assert_eq!(column_text(&a_cleaned, 0), vec!["la", "sf"]);
    let b_cleaned = read_table(&out.join("b_cleaned.xlsx")).expect("cleaned copy read");
    assert_eq!(b_cleaned.row_count(), 2);
    assert_eq!(sink.status, Some(RunStatus::Success));
}

#[test]
fn progress_fires_per_file_and_resets() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    let b = dir.path().join("b.xlsx");
    write_fixture(&a, &["city"], &[&["la"]]);
    write_fixture(&b, &["city"], &[&["sf"]]);

    let mut sink = Recorder::default();
    batch::run(
        &job(vec![a, b], dir.path().join("out")),
        &mut AlwaysOverwrite,
        &mut sink,
    )
    .expect("batch run");

    assert_eq!(sink.progress, vec![(1, 2), (2, 2), (0, 2)]);
}

#[test]
fn failing_file_does_not_abort_the_batch() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    let b = dir.path().join("b.xlsx");
    let c = dir.path().join("c.xlsx");
    write_fixture(&a, &["city"], &[&["la"], &["la"]]);
    write_fixture(&c, &["city"], &[&["sf"], &["oak"]]);
    // b is never created

    let combined = dir.path().join("combined.xlsx");
    let mut batch_job = job(vec![a.clone(), b.clone(), c.clone()], dir.path().join("out"));
    batch_job.combine_single_sheet = true;
    batch_job.single_sheet_path = Some(combined.clone());

    let mut sink = Recorder::default();
    let report =
        batch::run(&batch_job, &mut AlwaysOverwrite, &mut sink).expect("batch run");

    assert!(matches!(&report.outcomes[0], FileOutcome::Cleaned { input, .. } if input == &a));
    assert!(matches!(&report.outcomes[1], FileOutcome::Failed { input, .. } if input == &b));
    assert!(matches!(&report.outcomes[2], FileOutcome::Cleaned { input, .. } if input == &c));
    assert_eq!(report.status(), RunStatus::PartialFailure);
    assert_eq!(sink.progress, vec![(1, 3), (2, 3), (3, 3), (0, 3)]);

    // Accumulator holds only rows from the files that cleaned, in input order.
    let merged = read_table(&combined).expect("combined read");
    assert_eq!(column_text(&merged, 0), vec!["la", "sf", "oak"]);
}

#[test]
fn cancel_leaves_the_existing_destination_untouched() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    write_fixture(&a, &["city"], &[&["la"], &["la"]]);

    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).expect("output directory");
    let existing = out.join("a_cleaned.xlsx");
    write_fixture(
        &existing,
        &["marker"],
        &[&["one"], &["two"], &["three"]],
    );

    let report = batch::run(&job(vec![a], out), &mut CancelAll, &mut Recorder::default())
        .expect("batch run");

    assert!(matches!(&report.outcomes[0], FileOutcome::Skipped { .. }));
    assert_eq!(report.status(), RunStatus::PartialFailure);

    let untouched = read_table(&existing).expect("existing file read");
    assert_eq!(untouched.columns, vec!["marker"]);
    assert_eq!(untouched.row_count(), 3);
}

#[test]
fn rename_redirects_the_cleaned_copy() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    write_fixture(&a, &["city"], &[&["la"], &["la"]]);

    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).expect("output directory");
    let existing = out.join("a_cleaned.xlsx");
    write_fixture(&existing, &["marker"], &[&["one"]]);

    let renamed = out.join("a_take2.xlsx");
    let mut resolver = RenameTo(renamed.clone());
    let report = batch::run(&job(vec![a], out), &mut resolver, &mut Recorder::default())
        .expect("batch run");

    assert!(
        matches!(&report.outcomes[0], FileOutcome::Cleaned { output, .. } if output == &renamed)
    );

    let redirected = read_table(&renamed).expect("renamed copy read");
    assert_eq!(column_text(&redirected, 0), vec!["la"]);

    let untouched = read_table(&existing).expect("existing file read");
    assert_eq!(untouched.columns, vec!["marker"]);
}

#[test]
fn combined_totals_match_per_file_outputs() {
    let dir = tempdir().expect("temporary directory");
    let x = dir.path().join("x.xlsx");
    let y = dir.path().join("y.xlsx");
    write_fixture(&x, &["city", "count"], &[&["la", "1"], &["la", "1"]]);
    write_fixture(&y, &["city", "count"], &[&["sf", "2"], &["oak", "3"]]);

    let out = dir.path().join("out");
    let combined = dir.path().join("combined.xlsx");
    let mut batch_job = job(vec![x, y], out.clone());
    batch_job.combine_single_sheet = true;
    batch_job.single_sheet_path = Some(combined.clone());

    batch::run(&batch_job, &mut AlwaysOverwrite, &mut Recorder::default()).expect("batch run");

    let merged = read_table(&combined).expect("combined read");
    assert_eq!(merged.row_count(), 3);
    assert_eq!(column_text(&merged, 0), vec!["la", "sf", "oak"]);

    let x_cleaned = read_table(&out.join("x_cleaned.xlsx")).expect("cleaned copy read");
    assert_eq!(x_cleaned.row_count(), 1);
    let y_cleaned = read_table(&out.join("y_cleaned.xlsx")).expect("cleaned copy read");
    assert_eq!(y_cleaned.row_count(), 2);
}

#[test]
fn accumulator_takes_the_union_of_column_sets() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    let b = dir.path().join("b.xlsx");
    write_fixture(&a, &["city"], &[&["la"]]);
    write_fixture(&b, &["city", "count"], &[&["sf", "2"]]);

    let combined = dir.path().join("combined.xlsx");
    let mut batch_job = job(vec![a, b], dir.path().join("out"));
    batch_job.combine_single_sheet = true;
    batch_job.single_sheet_path = Some(combined.clone());

    batch::run(&batch_job, &mut AlwaysOverwrite, &mut Recorder::default()).expect("batch run");

    let merged = read_table(&combined).expect("combined read");
    assert_eq!(merged.columns, vec!["city", "count"]);
    assert_eq!(merged.rows[0][1], Cell::Empty);
    assert_eq!(merged.rows[1][1], Cell::Text("2".to_string()));
}

#[test]
fn missing_combined_path_aborts_before_processing() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    write_fixture(&a, &["city"], &[&["la"]]);

    let out = dir.path().join("out");
    let mut batch_job = job(vec![a], out.clone());
    batch_job.combine_single_sheet = true;

    let mut sink = Recorder::default();
    let error = batch::run(&batch_job, &mut AlwaysOverwrite, &mut sink).unwrap_err();

    assert!(matches!(error, CleanError::Config(_)));
    assert!(sink.progress.is_empty());
    assert!(!out.join("a_cleaned.xlsx").exists());
}

#[test]
fn empty_inputs_are_a_configuration_error() {
    let dir = tempdir().expect("temporary directory");

    let error = batch::run(
        &job(Vec::new(), dir.path().join("out")),
        &mut AlwaysOverwrite,
        &mut Recorder::default(),
    )
    .unwrap_err();

    assert!(matches!(error, CleanError::Config(_)));
}

#[test]
fn separate_sheets_mode_names_sheets_after_file_stems() {
    let dir = tempdir().expect("temporary directory");
    let sub = dir.path().join("sub");
    std::fs::create_dir_all(&sub).expect("subdirectory");

    let north = dir.path().join("north.xlsx");
    let south = dir.path().join("south.xlsx");
    let north_again = sub.join("north.xlsx");
    write_fixture(&north, &["city"], &[&["la"], &["la"]]);
    write_fixture(&south, &["city"], &[&["sf"]]);
    write_fixture(&north_again, &["city"], &[&["oak"]]);

    let document = dir.path().join("by_file.xlsx");
    let mut batch_job = job(
        vec![north, south, north_again],
        dir.path().join("out"),
    );
    batch_job.combine_separate_sheets = true;
    batch_job.separate_sheets_path = Some(document.clone());

    let report = batch::run(&batch_job, &mut AlwaysOverwrite, &mut Recorder::default())
        .expect("batch run");
    assert_eq!(report.status(), RunStatus::Success);

    // Colliding base names pick up a numeric suffix.
    let workbook: Xlsx<_> = open_workbook(&document).expect("document opened");
    assert_eq!(workbook.sheet_names().to_vec(), vec![
        "north".to_string(),
        "south".to_string(),
        "north_1".to_string(),
    ]);
}

#[test]
fn combined_workbook_is_written_even_when_every_file_fails() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("never_created_a.xlsx");
    let b = dir.path().join("never_created_b.xlsx");

    let combined = dir.path().join("combined.xlsx");
    let mut batch_job = job(vec![a, b], dir.path().join("out"));
    batch_job.combine_single_sheet = true;
    batch_job.single_sheet_path = Some(combined.clone());

    let report = batch::run(&batch_job, &mut AlwaysOverwrite, &mut Recorder::default())
        .expect("batch run");

    assert_eq!(report.status(), RunStatus::PartialFailure);
    let merged = read_table(&combined).expect("combined read");
    assert_eq!(merged.row_count(), 0);
}

#[test]
fn both_combine_modes_report_one_outcome_per_file_per_pass() {
    let dir = tempdir().expect("temporary directory");
    let a = dir.path().join("a.xlsx");
    write_fixture(&a, &["city"], &[&["la"], &["la"]]);

    let mut batch_job = job(vec![a], dir.path().join("out"));
    batch_job.combine_single_sheet = true;
    batch_job.single_sheet_path = Some(dir.path().join("combined.xlsx"));
    batch_job.combine_separate_sheets = true;
    batch_job.separate_sheets_path = Some(dir.path().join("by_file.xlsx"));

    let mut sink = Recorder::default();
    let report =
        batch::run(&batch_job, &mut AlwaysOverwrite, &mut sink).expect("batch run");

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(sink.progress, vec![(1, 1), (1, 1), (0, 1)]);
    assert!(dir.path().join("combined.xlsx").exists());
    assert!(dir.path().join("by_file.xlsx").exists());
}
