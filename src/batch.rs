use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::dedupe::dedupe;
use crate::error::{CleanError, Result};
use crate::io::excel_read;
use crate::io::excel_write::{self, WorkbookBuilder};
use crate::model::Table;

/// Configuration for one batch run, gathered up front from user selections
/// and discarded afterwards.
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    /// Workbooks to clean, processed strictly in this order.
    pub inputs: Vec<PathBuf>,
    /// Directory receiving the per-file cleaned copies. Created if absent.
    pub output_dir: PathBuf,
    /// Merge every cleaned table's rows into one flat combined workbook.
    pub combine_single_sheet: bool,
    /// Give every cleaned table its own sheet in one combined workbook.
    pub combine_separate_sheets: bool,
    /// Destination of the flat combined workbook. Required when
    /// `combine_single_sheet` is set.
    pub single_sheet_path: Option<PathBuf>,
    /// Destination of the sheet-per-file workbook. Required when
    /// `combine_separate_sheets` is set.
    pub separate_sheets_path: Option<PathBuf>,
}

impl BatchJob {
    fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(CleanError::Config("no input files selected".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CleanError::Config("no output directory selected".into()));
        }
        if self.combine_single_sheet && self.single_sheet_path.is_none() {
            return Err(CleanError::Config(
                "combined output path not set for single-sheet mode".into(),
            ));
        }
        if self.combine_separate_sheets && self.separate_sheets_path.is_none() {
            return Err(CleanError::Config(
                "combined output path not set for separate-sheets mode".into(),
            ));
        }
        Ok(())
    }
}

/// Decision returned by a [`ConflictResolver`] when a cleaned copy would
/// overwrite an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the original destination and overwrite it.
    Overwrite,
    /// Write to this destination instead.
    Rename(PathBuf),
    /// Leave the existing file alone and skip the write.
    Cancel,
}

/// Answers overwrite conflicts for per-file outputs.
///
/// The interactive front end prompts the user; headless callers inject a
/// fixed policy such as [`AlwaysOverwrite`]. The resolver is only consulted
/// when the candidate destination already exists on disk.
pub trait ConflictResolver {
    fn resolve(&mut self, existing: &Path) -> Resolution;
}

/// Policy resolver that overwrites every conflicting destination.
pub struct AlwaysOverwrite;

impl ConflictResolver for AlwaysOverwrite {
    fn resolve(&mut self, _existing: &Path) -> Resolution {
        Resolution::Overwrite
    }
}

/// Policy resolver that skips every conflicting destination.
pub struct AlwaysSkip;

impl ConflictResolver for AlwaysSkip {
    fn resolve(&mut self, _existing: &Path) -> Resolution {
        Resolution::Cancel
    }
}

/// Receives progress and completion callbacks during a run.
///
/// `progress` fires after every file, whatever its outcome, and once more
/// with `done == 0` when the run winds down, so a progress bar ends reset.
pub trait EventSink {
    fn progress(&mut self, _done: usize, _total: usize) {}

    /// Called once after the last pass with the final report.
    fn finished(&mut self, _report: &RunReport) {}

    /// Called instead of `finished` when the run fails as a whole.
    fn fatal(&mut self, _error: &CleanError) {}
}

/// Sink that ignores every event.
pub struct NullSink;

impl EventSink for NullSink {}

/// Result of processing one input file in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The cleaned copy was written to `output`.
    Cleaned {
        input: PathBuf,
        output: PathBuf,
        rows_kept: usize,
        rows_dropped: usize,
    },
    /// The file could not be read or written.
    Failed { input: PathBuf, reason: String },
    /// The user declined to overwrite the existing destination.
    Skipped { input: PathBuf, reason: String },
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every file in every pass produced a cleaned copy.
    Success,
    /// At least one file failed or was skipped.
    PartialFailure,
}

/// Ordered outcomes of one run: one entry per input file per pass performed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        let all_cleaned = self
            .outcomes
            .iter()
            .all(|outcome| matches!(outcome, FileOutcome::Cleaned { .. }));
        if all_cleaned {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Human-readable summary of the run.
    pub fn message(&self) -> String {
        let cleaned = self.count(|o| matches!(o, FileOutcome::Cleaned { .. }));
        let failed = self.count(|o| matches!(o, FileOutcome::Failed { .. }));
        let skipped = self.count(|o| matches!(o, FileOutcome::Skipped { .. }));
        match self.status() {
            RunStatus::Success => format!("cleaned {cleaned} of {cleaned} files"),
            RunStatus::PartialFailure => format!(
                "cleaned {cleaned} of {} files ({failed} failed, {skipped} skipped)",
                self.outcomes.len()
            ),
        }
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

/// Runs `job` to completion.
///
/// File-level read and write failures never abort the run; they become
/// `Failed` outcomes and the loop moves on to the next file. Only an
/// under-specified job aborts, before any input is touched. Run-level
/// failures, such as a combined output that cannot be written, surface as
/// `Err` after the progress reset and a `fatal` callback.
#[instrument(level = "info", skip_all, fields(files = job.inputs.len()))]
pub fn run(
    job: &BatchJob,
    resolver: &mut dyn ConflictResolver,
    sink: &mut dyn EventSink,
) -> Result<RunReport> {
    job.validate()?;
    fs::create_dir_all(&job.output_dir)?;

    let mut report = RunReport::default();
    let result = run_passes(job, resolver, sink, &mut report);
    sink.progress(0, job.inputs.len());

    match result {
        Ok(()) => {
            info!(status = ?report.status(), "batch finished");
            sink.finished(&report);
            Ok(report)
        }
        Err(error) => {
            warn!(%error, "batch aborted");
            sink.fatal(&error);
            Err(error)
        }
    }
}

fn run_passes(
    job: &BatchJob,
    resolver: &mut dyn ConflictResolver,
    sink: &mut dyn EventSink,
    report: &mut RunReport,
) -> Result<()> {
    if job.combine_single_sheet {
        run_single_sheet_pass(job, resolver, sink, report)?;
    }
    if job.combine_separate_sheets {
        run_separate_sheets_pass(job, resolver, sink, report)?;
    }
    if !job.combine_single_sheet && !job.combine_separate_sheets {
        run_plain_pass(job, resolver, sink, report);
    }
    Ok(())
}

/// Pass 1: clean each file, accumulate every cleaned table into one flat
/// table, and write it once at the end. The combined workbook is written
/// even when every file failed and the table is empty.
fn run_single_sheet_pass(
    job: &BatchJob,
    resolver: &mut dyn ConflictResolver,
    sink: &mut dyn EventSink,
    report: &mut RunReport,
) -> Result<()> {
    let Some(target) = job.single_sheet_path.as_deref() else {
        return Err(CleanError::Config(
            "combined output path not set for single-sheet mode".into(),
        ));
    };

    let total = job.inputs.len();
    let mut combined = Table::default();

    for (index, input) in job.inputs.iter().enumerate() {
        match clean_file(input) {
            Ok((cleaned, dropped)) => {
                combined.append_rows(&cleaned);
                let outcome = write_cleaned_copy(job, input, &cleaned, dropped, resolver);
                report.outcomes.push(outcome);
            }
            Err(error) => report.outcomes.push(fail(input, &error)),
        }
        sink.progress(index + 1, total);
    }

    excel_write::write_table(target, &combined)?;
    info!(
        rows = combined.row_count(),
        path = %target.display(),
        "combined workbook written"
    );
    Ok(())
}

/// Pass 2: clean each file, give it its own sheet in the combined document,
/// then write the per-file copy. The document is flushed to disk once, after
/// the last file.
fn run_separate_sheets_pass(
    job: &BatchJob,
    resolver: &mut dyn ConflictResolver,
    sink: &mut dyn EventSink,
    report: &mut RunReport,
) -> Result<()> {
    let Some(target) = job.separate_sheets_path.as_deref() else {
        return Err(CleanError::Config(
            "combined output path not set for separate-sheets mode".into(),
        ));
    };

    let total = job.inputs.len();
    let mut document = WorkbookBuilder::new();

    for (index, input) in job.inputs.iter().enumerate() {
        match clean_file(input) {
            Ok((cleaned, dropped)) => match document.add_sheet(&sheet_base_name(input), &cleaned) {
                Ok(sheet_name) => {
                    info!(input = %input.display(), sheet = %sheet_name, "sheet appended");
                    let outcome = write_cleaned_copy(job, input, &cleaned, dropped, resolver);
                    report.outcomes.push(outcome);
                }
                Err(error) => report.outcomes.push(fail(input, &error)),
            },
            Err(error) => report.outcomes.push(fail(input, &error)),
        }
        sink.progress(index + 1, total);
    }

    document.save(target)?;
    info!(path = %target.display(), "sheet-per-file workbook written");
    Ok(())
}

/// Pass 3: the minimal clean-and-save mode used when no combine flag is set.
fn run_plain_pass(
    job: &BatchJob,
    resolver: &mut dyn ConflictResolver,
    sink: &mut dyn EventSink,
    report: &mut RunReport,
) {
    let total = job.inputs.len();
    for (index, input) in job.inputs.iter().enumerate() {
        let outcome = match clean_file(input) {
            Ok((cleaned, dropped)) => write_cleaned_copy(job, input, &cleaned, dropped, resolver),
            Err(error) => fail(input, &error),
        };
        report.outcomes.push(outcome);
        sink.progress(index + 1, total);
    }
}

fn clean_file(input: &Path) -> Result<(Table, usize)> {
    let table = excel_read::read_table(input)?;
    let cleaned = dedupe(&table);
    let dropped = table.row_count() - cleaned.row_count();
    info!(
        input = %input.display(),
        rows = cleaned.row_count(),
        dropped,
        "file cleaned"
    );
    Ok((cleaned, dropped))
}

/// Candidate destination for the cleaned copy of `input` inside the output
/// directory.
fn cleaned_path(dir: &Path, input: &Path) -> PathBuf {
    dir.join(format!("{}_cleaned.xlsx", sheet_base_name(input)))
}

fn sheet_base_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Resolves overwrite conflicts and writes the cleaned copy, returning the
/// outcome for this file.
fn write_cleaned_copy(
    job: &BatchJob,
    input: &Path,
    cleaned: &Table,
    dropped: usize,
    resolver: &mut dyn ConflictResolver,
) -> FileOutcome {
    let mut target = cleaned_path(&job.output_dir, input);

    if target.exists() {
        match resolver.resolve(&target) {
            Resolution::Overwrite => {}
            Resolution::Rename(new_path) => target = new_path,
            Resolution::Cancel => {
                info!(input = %input.display(), "overwrite declined, skipping");
                return FileOutcome::Skipped {
                    input: input.to_path_buf(),
                    reason: format!("declined to overwrite {}", target.display()),
                };
            }
        }
    }

    match excel_write::write_table(&target, cleaned) {
        Ok(()) => FileOutcome::Cleaned {
            input: input.to_path_buf(),
            output: target,
            rows_kept: cleaned.row_count(),
            rows_dropped: dropped,
        },
        Err(error) => fail(input, &error),
    }
}

fn fail(input: &Path, error: &CleanError) -> FileOutcome {
    warn!(input = %input.display(), %error, "skipping file");
    FileOutcome::Failed {
        input: input.to_path_buf(),
        reason: error.to_string(),
    }
}
