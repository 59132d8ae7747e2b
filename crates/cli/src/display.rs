//! Terminal output for results, history and comparisons.

use colored::{ColoredString, Colorize};
use stonebench_core::{BenchmarkResult, Metric, RunStatus, SeriesReport};
use stonebench_report::format;
use stonebench_storage::{Comparison, HistoryEntry};

/// Status word colored by outcome.
pub fn status(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Completed => status.as_str().green().bold(),
        RunStatus::Cancelled => status.as_str().yellow().bold(),
        RunStatus::Failed => status.as_str().red().bold(),
    }
}

/// Multi-line summary of one run.
pub fn print_result(result: &BenchmarkResult) {
    println!("{}", "Benchmark Result".bold().underline());
    println!("  {:<12} {}", "Run ID:", result.id);
    println!("  {:<12} {}", "Workload:", result.workload);
    println!("  {:<12} {}", "Status:", status(result.status));
    println!(
        "  {:<12} {} of {}",
        "Iterations:", result.raw_timing.iterations, result.requested_iterations
    );
    println!(
        "  {:<12} {:.3} s",
        "Elapsed:",
        result.raw_timing.elapsed_nanos as f64 / 1e9
    );
    println!(
        "  {:<12} {} ops/s",
        "Score:",
        format::ops(result.summary_stats.ops_per_second).cyan().bold()
    );

    if result.summary_stats.metrics.is_empty() {
        println!("  {}", "No telemetry captured".dimmed());
        return;
    }

    println!();
    println!(
        "  {:<26} {:>12} {:>12} {:>12} {:>12}",
        "Metric".bold(),
        "Min".bold(),
        "Mean".bold(),
        "Max".bold(),
        "Std Dev".bold()
    );
    for (metric, stats) in &result.summary_stats.metrics {
        let value = |v: f64| format::metric_value(*metric, v);
        println!(
            "  {:<26} {:>12} {:>12} {:>12} {:>12}",
            metric.as_str(),
            value(stats.min),
            value(stats.mean),
            value(stats.max),
            value(stats.stddev)
        );
    }
}

/// One-line summary, for quiet mode.
pub fn print_result_line(result: &BenchmarkResult) {
    println!(
        "{} {} {} {:.1}",
        result.id, result.workload, result.status, result.summary_stats.ops_per_second
    );
}

/// Score summary and per-run table of a series.
pub fn print_series(series: &SeriesReport) {
    println!("{}", "Benchmark Series".bold().underline());
    println!(
        "  {:<12} {} of {} completed ({})",
        "Runs:",
        series.completed(),
        series.runs_requested,
        status(series.status())
    );
    match series.scores {
        Some(scores) => {
            println!("  {:<12} {} ops/s", "Average:", format::ops(scores.mean).cyan().bold());
            println!("  {:<12} {} ops/s", "Best:", format::ops(scores.max));
            println!("  {:<12} {} ops/s", "Worst:", format::ops(scores.min));
            println!("  {:<12} {} ops/s", "Std Dev:", format::ops(scores.stddev));
        }
        None => println!("  {}", "No run completed".dimmed()),
    }

    println!();
    println!(
        "  {:<4} {:<10} {:<10} {:>12} {:>16}",
        "#".bold(),
        "Run".bold(),
        "Status".bold(),
        "Iterations".bold(),
        "Score (ops/s)".bold()
    );
    for (index, result) in series.results.iter().enumerate() {
        println!(
            "  {:<4} {:<10} {:<10} {:>12} {:>16}",
            index + 1,
            format::short_id(&result.id),
            status(result.status),
            result.raw_timing.iterations,
            format::ops(result.summary_stats.ops_per_second)
        );
    }
}

/// One-line series summary, for quiet mode: status, completed runs, then
/// average, best and worst ops/s.
pub fn print_series_line(series: &SeriesReport) {
    let score = |v: Option<f64>| v.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string());
    println!(
        "{} {}/{} {} {} {}",
        series.status(),
        series.completed(),
        series.runs_requested,
        score(series.average()),
        score(series.best()),
        score(series.worst())
    );
}

/// Table of history entries.
pub fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("{}", "No matching history entries".dimmed());
        return;
    }

    println!(
        "{:<10} {:<20} {:<14} {:<10} {:>12} {:>16} {:>9}",
        "Run".bold(),
        "Finished".bold(),
        "Workload".bold(),
        "Status".bold(),
        "Iterations".bold(),
        "Score (ops/s)".bold(),
        "CPU".bold()
    );
    for entry in entries {
        let result = &entry.result;
        let cpu = result
            .summary_stats
            .get(Metric::CpuPercent)
            .map(|s| format::metric_value(Metric::CpuPercent, s.mean))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<20} {:<14} {:<10} {:>12} {:>16} {:>9}",
            format::short_id(&result.id),
            result.finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            result.workload.as_str(),
            status(result.status),
            result.raw_timing.iterations,
            format::ops(result.summary_stats.ops_per_second),
            cpu
        );
    }
    println!("{}", format!("{} entries", entries.len()).dimmed());
}

/// Delta table of a comparison.
pub fn print_comparison(comparison: &Comparison) {
    let a = &comparison.entry_a.result;
    let b = &comparison.entry_b.result;
    println!("{} {} ({}, {})", "A:".bold(), a.id, a.workload, status(a.status));
    println!("{} {} ({}, {})", "B:".bold(), b.id, b.workload, status(b.status));
    println!();
    println!(
        "{:<36} {:>16} {:>16} {:>16} {:>10}",
        "Statistic".bold(),
        "A".bold(),
        "B".bold(),
        "Delta".bold(),
        "Delta %".bold()
    );

    let cell = |v: Option<f64>| v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string());
    for (name, delta) in &comparison.deltas {
        let percent = format::percent(delta.percent);
        let percent = match delta.percent {
            Some(p) if p > 0.0 => percent.green(),
            Some(p) if p < 0.0 => percent.red(),
            _ => percent.normal(),
        };
        println!(
            "{:<36} {:>16} {:>16} {:>16} {:>10}",
            name,
            cell(delta.a),
            cell(delta.b),
            delta
                .absolute
                .map(|v| format!("{v:+.3}"))
                .unwrap_or_else(|| "-".to_string()),
            percent
        );
    }
}
