use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use sheetclean::batch::{
    self, AlwaysOverwrite, AlwaysSkip, BatchJob, ConflictResolver, EventSink, Resolution,
    RunReport, RunStatus,
};
use sheetclean::{CleanError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Clean(args) => execute_clean(args),
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| CleanError::Logging(error.to_string()))
}

fn execute_clean(args: CleanArgs) -> Result<()> {
    for input in &args.inputs {
        if !input.exists() {
            return Err(CleanError::MissingInput(input.clone()));
        }
    }

    let job = BatchJob {
        combine_single_sheet: args.combined.is_some(),
        combine_separate_sheets: args.sheets.is_some(),
        single_sheet_path: args.combined,
        separate_sheets_path: args.sheets,
        inputs: args.inputs,
        output_dir: args.output_dir,
    };

    let mut sink = ConsoleSink { json: args.json };
    let report = match args.on_conflict {
        ConflictChoice::Prompt => batch::run(&job, &mut PromptResolver, &mut sink)?,
        ConflictChoice::Overwrite => batch::run(&job, &mut AlwaysOverwrite, &mut sink)?,
        ConflictChoice::Skip => batch::run(&job, &mut AlwaysSkip, &mut sink)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Remove duplicate rows from Excel workbooks in batches."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean the selected workbooks and optionally merge the results.
    Clean(CleanArgs),
}

#[derive(clap::Args)]
struct CleanArgs {
    /// Workbooks to clean, processed in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving the per-file cleaned copies.
    #[arg(long)]
    output_dir: PathBuf,

    /// Merge all cleaned rows into one flat workbook at this path.
    #[arg(long)]
    combined: Option<PathBuf>,

    /// Give each cleaned file its own sheet in one workbook at this path.
    #[arg(long)]
    sheets: Option<PathBuf>,

    /// What to do when a cleaned copy would overwrite an existing file.
    #[arg(long, value_enum, default_value = "prompt")]
    on_conflict: ConflictChoice,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ConflictChoice {
    Prompt,
    Overwrite,
    Skip,
}

/// Interactive resolver backed by stdin. Cancelling the rename sub-prompt
/// degrades to skipping the file.
struct PromptResolver;

impl ConflictResolver for PromptResolver {
    fn resolve(&mut self, existing: &Path) -> Resolution {
        loop {
            let answer = match ask(&format!(
                "'{}' already exists. [o]verwrite / [r]ename / [s]kip? ",
                existing.display()
            )) {
                Some(answer) => answer,
                None => return Resolution::Cancel,
            };

            match answer.as_str() {
                "o" | "overwrite" => return Resolution::Overwrite,
                "r" | "rename" => {
                    let path = ask("new path: ").unwrap_or_default();
                    if path.is_empty() {
                        return Resolution::Cancel;
                    }
                    return Resolution::Rename(PathBuf::from(path));
                }
                "s" | "skip" => return Resolution::Cancel,
                _ => continue,
            }
        }
    }
}

/// Prompts on stderr and reads one trimmed line from stdin. `None` on EOF.
fn ask(prompt: &str) -> Option<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
    }
}

struct ConsoleSink {
    json: bool,
}

impl EventSink for ConsoleSink {
    fn progress(&mut self, done: usize, total: usize) {
        if done > 0 {
            eprintln!("[{done}/{total}]");
        }
    }

    fn finished(&mut self, report: &RunReport) {
        if self.json {
            return;
        }
        for outcome in &report.outcomes {
            match outcome {
                batch::FileOutcome::Cleaned {
                    input,
                    output,
                    rows_kept,
                    rows_dropped,
                } => eprintln!(
                    "cleaned {} -> {} ({rows_kept} rows, {rows_dropped} duplicates removed)",
                    input.display(),
                    output.display()
                ),
                batch::FileOutcome::Failed { input, reason } => {
                    eprintln!("failed  {}: {reason}", input.display());
                }
                batch::FileOutcome::Skipped { input, reason } => {
                    eprintln!("skipped {}: {reason}", input.display());
                }
            }
        }
        match report.status() {
            RunStatus::Success => eprintln!("{}", report.message()),
            RunStatus::PartialFailure => eprintln!("warning: {}", report.message()),
        }
    }

    fn fatal(&mut self, error: &CleanError) {
        eprintln!("run aborted: {error}");
    }
}
