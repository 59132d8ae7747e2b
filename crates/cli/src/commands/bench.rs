//! The default command: run one benchmark, or a series of them.

use crate::settings::Settings;
use crate::{display, ExportFormat, Outcome, RunArgs};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stonebench_core::{
    BenchError, BenchmarkOrchestrator, BenchmarkResult, DiscardSink, OrchestratorBuilder,
    Progress, ResultSink, RunConfig, RunStatus, SeriesReport,
};
use stonebench_report::{io, markdown};
use stonebench_storage::ResultStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Flags override settings.
pub fn run_config(settings: &Settings, args: &RunArgs) -> RunConfig {
    let mut config = RunConfig::new(args.iterations.unwrap_or(settings.iterations))
        .with_workload(args.workload.unwrap_or(settings.workload));
    if let Some(ms) = args.timeout_ms.or(settings.timeout_ms) {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    config
}

/// Run the benchmark and report it.
pub async fn run(settings: &Settings, args: RunArgs, quiet: bool) -> anyhow::Result<Outcome> {
    let config = run_config(settings, &args);
    let runs = args.runs.unwrap_or(settings.runs);
    if runs == 0 {
        anyhow::bail!("--runs must be at least 1");
    }
    let orchestrator_config = settings.orchestrator_config(args.interval_ms)?;

    let sink: Arc<dyn ResultSink> = if args.no_save {
        Arc::new(DiscardSink)
    } else {
        let path = settings.history_path();
        let store = ResultStore::open(&path)
            .with_context(|| format!("Failed to open history at {}", path.display()))?;
        Arc::new(store)
    };

    let orchestrator = OrchestratorBuilder::new()
        .config(orchestrator_config)
        .sink(sink)
        .build()?;

    if runs > 1 {
        return run_series(&orchestrator, config, runs, &args, quiet).await;
    }

    let handle = orchestrator.start(config)?;
    tracing::info!(run_id = %handle.run_id(), "Benchmark started");
    let done = CancellationToken::new();
    let progress = (!quiet).then(|| spawn_progress(orchestrator.subscribe(), config.iterations, 1, done.clone()));

    let canceller = orchestrator.clone();
    let signal = spawn_signal_handler(move || {
        canceller.cancel();
    });

    let outcome = handle.wait().await;
    signal.abort();
    finish_progress(progress, done).await;

    let (result, outcome) = match outcome {
        Ok(result) => {
            let outcome = Outcome::from(result.status);
            (result, outcome)
        }
        Err(BenchError::Persistence { source, result }) => {
            tracing::warn!(run_id = %result.id, error = %source, "Result not saved");
            eprintln!("Warning: result {} could not be saved: {}", result.id, source);
            (*result, Outcome::Failed)
        }
        Err(e) => return Err(e.into()),
    };

    report(&result, &args, quiet)?;
    Ok(outcome)
}

async fn run_series(
    orchestrator: &BenchmarkOrchestrator,
    config: RunConfig,
    runs: u32,
    args: &RunArgs,
    quiet: bool,
) -> anyhow::Result<Outcome> {
    let stop = CancellationToken::new();
    let done = CancellationToken::new();
    let progress = (!quiet).then(|| spawn_progress(orchestrator.subscribe(), config.iterations, runs, done.clone()));
    let trigger = stop.clone();
    let signal = spawn_signal_handler(move || trigger.cancel());

    tracing::info!(runs, "Benchmark series started");
    let series = orchestrator.run_series(config, runs, &stop).await;
    signal.abort();
    finish_progress(progress, done).await;
    let series = series?;

    if let Some(unsaved) = series.results.last().filter(|r| r.status == RunStatus::Failed) {
        eprintln!("Warning: result {} could not be saved; series stopped", unsaved.id);
    }

    report_series(&series, args, quiet)?;
    Ok(Outcome::from(series.status()))
}

/// JSON exports `document`; CSV flattens `results`.
fn export<T: Serialize + ?Sized>(
    results: &[BenchmarkResult],
    document: &T,
    format: ExportFormat,
    path: &Path,
) -> std::io::Result<()> {
    match format {
        ExportFormat::Json => io::write_json(document, path),
        ExportFormat::Csv => io::export_csv(results, path),
    }
}

fn report(result: &BenchmarkResult, args: &RunArgs, quiet: bool) -> anyhow::Result<()> {
    if let Some(path) = &args.output {
        export(std::slice::from_ref(result), result, args.format, path)
            .with_context(|| format!("Failed to export result to {}", path.display()))?;
        tracing::info!(path = %path.display(), format = ?args.format, "Result exported");
    }

    if args.markdown {
        print!("{}", markdown::render_result(result));
    } else if quiet {
        display::print_result_line(result);
    } else {
        display::print_result(result);
        if result.status == RunStatus::Cancelled {
            println!(
                "\nRun cancelled after {} of {} iterations.",
                result.raw_timing.iterations, result.requested_iterations
            );
        }
    }
    Ok(())
}

fn report_series(series: &SeriesReport, args: &RunArgs, quiet: bool) -> anyhow::Result<()> {
    if let Some(path) = &args.output {
        export(&series.results, series, args.format, path)
            .with_context(|| format!("Failed to export series to {}", path.display()))?;
        tracing::info!(path = %path.display(), format = ?args.format, "Series exported");
    }

    if args.markdown {
        print!("{}", markdown::render_series(series));
    } else if quiet {
        display::print_series_line(series);
    } else {
        display::print_series(series);
    }
    Ok(())
}

fn spawn_signal_handler<F>(on_signal: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, cancelling run...");
                on_signal();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        }
    })
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {prefix}[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Draw a bar that restarts for each run it sees, until `done` fires.
fn spawn_progress(
    mut updates: watch::Receiver<Progress>,
    total: u64,
    runs: u32,
    done: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(total);
        bar.set_style(progress_style());
        bar.enable_steady_tick(Duration::from_millis(120));

        let mut current = updates.borrow().run_id;
        let mut index = 0u32;
        loop {
            let progress = updates.borrow_and_update().clone();
            if progress.run_id.is_some() && progress.run_id != current {
                current = progress.run_id;
                index += 1;
                bar.reset();
                if runs > 1 {
                    bar.set_prefix(format!("run {index}/{runs} "));
                }
            }
            bar.set_position(progress.iterations_done);
            if let Some(cpu) = progress.latest_sample.as_ref().and_then(|s| s.cpu_percent) {
                bar.set_message(format!("cpu {cpu:.0}%"));
            }

            tokio::select! {
                _ = done.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        bar.finish_and_clear();
    })
}

async fn finish_progress(progress: Option<JoinHandle<()>>, done: CancellationToken) {
    done.cancel();
    if let Some(progress) = progress {
        let _ = progress.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stonebench_core::WorkloadKind;

    #[test]
    fn test_flags_override_settings() {
        let settings = Settings {
            iterations: 10,
            timeout_ms: Some(1_000),
            ..Settings::default()
        };
        let args = RunArgs {
            iterations: Some(25),
            workload: Some(WorkloadKind::IntegerSort),
            ..RunArgs::default()
        };
        let config = run_config(&settings, &args);
        assert_eq!(config.iterations, 25);
        assert_eq!(config.workload, WorkloadKind::IntegerSort);
        assert_eq!(config.timeout, Some(Duration::from_secs(1)));

        let defaults = run_config(&Settings::default(), &RunArgs::default());
        assert_eq!(defaults.iterations, 50_000);
        assert_eq!(defaults.timeout, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_without_saving() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out").join("run.json");
        let settings = Settings {
            history_path: Some(dir.path().join("history.jsonl")),
            ..Settings::default()
        };
        let args = RunArgs {
            iterations: Some(500),
            output: Some(output.clone()),
            no_save: true,
            ..RunArgs::default()
        };

        let outcome = run(&settings, args, true).await.unwrap();
        assert_eq!(outcome, Outcome::Success);
        assert!(!dir.path().join("history.jsonl").exists());

        let exported = io::read_result(&output).unwrap();
        assert_eq!(exported.raw_timing.iterations, 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_maps_to_cancelled() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings {
            history_path: Some(dir.path().join("history.jsonl")),
            ..Settings::default()
        };
        let args = RunArgs {
            iterations: Some(1 << 40),
            timeout_ms: Some(50),
            interval_ms: Some(10),
            ..RunArgs::default()
        };

        let outcome = run(&settings, args, true).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
        let store = ResultStore::open(dir.path().join("history.jsonl")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_series_saves_each_run_and_exports_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("series.csv");
        let settings = Settings {
            history_path: Some(dir.path().join("history.jsonl")),
            runs: 3,
            ..Settings::default()
        };
        let args = RunArgs {
            iterations: Some(300),
            output: Some(output.clone()),
            format: ExportFormat::Csv,
            ..RunArgs::default()
        };

        let outcome = run(&settings, args, true).await.unwrap();
        assert_eq!(outcome, Outcome::Success);

        let store = ResultStore::open(dir.path().join("history.jsonl")).unwrap();
        assert_eq!(store.len(), 3);

        let csv = std::fs::read_to_string(&output).unwrap();
        assert!(csv.starts_with("name,score,unit,iterations,min,max,mean,median,stdev,"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_series_json_export_and_zero_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("series.json");
        let settings = Settings {
            history_path: Some(dir.path().join("history.jsonl")),
            ..Settings::default()
        };
        let args = RunArgs {
            iterations: Some(200),
            runs: Some(2),
            output: Some(output.clone()),
            no_save: true,
            ..RunArgs::default()
        };

        let outcome = run(&settings, args, true).await.unwrap();
        assert_eq!(outcome, Outcome::Success);
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["runs_requested"], 2);
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
        assert_eq!(json["scores"]["count"], 2);

        let zero = RunArgs {
            runs: Some(0),
            no_save: true,
            ..RunArgs::default()
        };
        assert!(run(&settings, zero, true).await.is_err());
    }
}
