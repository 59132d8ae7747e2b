//! CLI for Stonebench.
//!
//! Without a subcommand the binary runs one benchmark, shows a progress bar,
//! prints the summary and appends the result to the history file. The
//! subcommands browse and maintain that history.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commands;
pub mod display;
pub mod logging;
pub mod settings;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use settings::{LogFormat, Settings};
use std::path::PathBuf;
use stonebench_core::{RunStatus, WorkloadKind};
use uuid::Uuid;

/// Stonebench CLI.
#[derive(Parser, Debug)]
#[command(name = "stonebench")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Benchmark options used when no subcommand is given.
    #[command(flatten)]
    pub run: RunArgs,

    /// Settings file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "STONEBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// History file override.
    #[arg(long, global = true)]
    pub history: Option<PathBuf>,

    /// Non-interactive mode: no progress bar, one-line summary.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// History subcommand.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options for a benchmark run.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Iterations to run.
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Workload: pystone, float_math, integer_sort or memory_churn.
    #[arg(short, long)]
    pub workload: Option<WorkloadKind>,

    /// Runs to execute back to back; more than one prints a series summary.
    #[arg(short, long)]
    pub runs: Option<u32>,

    /// Export the result to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Format of the `--output` file.
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// Cancel the run after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Sampler interval in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Do not append the result to history.
    #[arg(long)]
    pub no_save: bool,

    /// Print the result as Markdown instead of the colored summary.
    #[arg(long)]
    pub markdown: bool,
}

/// File format for `--output`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Pretty-printed JSON: the result, or the whole series report.
    #[default]
    Json,
    /// One CSV row per run.
    Csv,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List stored runs, newest first.
    History(HistoryArgs),

    /// Show one stored run.
    Show {
        /// Run id.
        id: Uuid,

        /// Print as Markdown.
        #[arg(long)]
        markdown: bool,

        /// Print as JSON.
        #[arg(long, conflicts_with = "markdown")]
        json: bool,
    },

    /// Compare run B against baseline run A.
    Compare {
        /// Baseline run id.
        a: Uuid,

        /// Compared run id.
        b: Uuid,

        /// Print as Markdown.
        #[arg(long)]
        markdown: bool,

        /// Print as JSON.
        #[arg(long, conflicts_with = "markdown")]
        json: bool,
    },

    /// Remove a run from history.
    Forget {
        /// Run id.
        id: Uuid,
    },

    /// Rewrite the history file without removed runs.
    Compact,

    /// List the available workloads.
    Workloads,
}

/// Filters for `history`.
#[derive(Args, Debug, Default, Clone)]
pub struct HistoryArgs {
    /// Earliest finish time (RFC 3339).
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Latest finish time (RFC 3339).
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,

    /// Statuses to include, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<RunStatus>,

    /// Only runs of this workload.
    #[arg(short, long)]
    pub workload: Option<WorkloadKind>,

    /// Show at most this many runs.
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Print as Markdown.
    #[arg(long)]
    pub markdown: bool,

    /// Print as JSON.
    #[arg(long, conflicts_with = "markdown")]
    pub json: bool,
}

/// How a CLI invocation ended, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Run completed, or a history command succeeded.
    Success,
    /// Run failed, including a result that could not be saved.
    Failed,
    /// Run was cancelled by Ctrl+C or its deadline.
    Cancelled,
}

impl Outcome {
    /// Process exit code.
    pub fn code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failed => 1,
            Outcome::Cancelled => 3,
        }
    }
}

impl From<RunStatus> for Outcome {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => Outcome::Success,
            RunStatus::Cancelled => Outcome::Cancelled,
            RunStatus::Failed => Outcome::Failed,
        }
    }
}

/// Run the CLI with parsed arguments.
pub async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(history) = cli.history {
        settings.history_path = Some(history);
    }

    logging::init(
        &settings.log_level,
        cli.log_format.unwrap_or(settings.log_format),
        cli.quiet,
    );

    match cli.command {
        None => commands::bench::run(&settings, cli.run, cli.quiet).await,
        Some(Commands::History(args)) => commands::history::list(&settings, args),
        Some(Commands::Show { id, markdown, json }) => {
            commands::history::show(&settings, id, markdown, json)
        }
        Some(Commands::Compare {
            a,
            b,
            markdown,
            json,
        }) => commands::history::compare(&settings, a, b, markdown, json),
        Some(Commands::Forget { id }) => commands::history::forget(&settings, id),
        Some(Commands::Compact) => commands::history::compact(&settings),
        Some(Commands::Workloads) => {
            commands::history::workloads();
            Ok(Outcome::Success)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_run() {
        let cli = Cli::try_parse_from(["stonebench", "-n", "2000", "-w", "float-math", "-q"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.iterations, Some(2_000));
        assert_eq!(cli.run.workload, Some(WorkloadKind::FloatMath));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_series_with_csv_export() {
        let cli = Cli::try_parse_from(["stonebench", "-r", "5", "-o", "runs.csv", "--format", "csv"]).unwrap();
        assert_eq!(cli.run.runs, Some(5));
        assert_eq!(cli.run.format, ExportFormat::Csv);

        let defaults = Cli::try_parse_from(["stonebench"]).unwrap();
        assert_eq!(defaults.run.runs, None);
        assert_eq!(defaults.run.format, ExportFormat::Json);
        assert!(Cli::try_parse_from(["stonebench", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_parse_history_filters() {
        let cli = Cli::try_parse_from([
            "stonebench",
            "history",
            "--status",
            "completed,cancelled",
            "--since",
            "2025-01-01T00:00:00Z",
            "--limit",
            "5",
        ])
        .unwrap();
        let Some(Commands::History(args)) = cli.command else {
            panic!("expected history subcommand");
        };
        assert_eq!(args.status, vec![RunStatus::Completed, RunStatus::Cancelled]);
        assert_eq!(args.limit, Some(5));
        assert!(args.since.is_some());
    }

    #[test]
    fn test_parse_rejects_unknown_workload() {
        assert!(Cli::try_parse_from(["stonebench", "-w", "whetstone"]).is_err());
        assert!(Cli::try_parse_from(["stonebench", "show", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::from(RunStatus::Completed).code(), 0);
        assert_eq!(Outcome::from(RunStatus::Failed).code(), 1);
        assert_eq!(Outcome::from(RunStatus::Cancelled).code(), 3);
    }
}
