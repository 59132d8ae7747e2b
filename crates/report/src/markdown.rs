//! Markdown output generation for results, history and comparisons.

use crate::format;
use std::fmt::{self, Write};
use stonebench_core::{BenchmarkResult, Metric, SeriesReport};
use stonebench_storage::{Comparison, HistoryEntry};

/// Render a single result as a Markdown report.
pub fn render_result(result: &BenchmarkResult) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_result(&mut output, result);
    output
}

/// Render history entries as a Markdown table, in the order given.
pub fn render_history<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    let mut output = String::new();
    let _ = write_history(&mut output, entries);
    output
}

/// Render a comparison as a Markdown table.
pub fn render_comparison(comparison: &Comparison) -> String {
    let mut output = String::new();
    let _ = write_comparison(&mut output, comparison);
    output
}

/// Render a run series: the score summary, then one row per run.
pub fn render_series(series: &SeriesReport) -> String {
    let mut output = String::new();
    let _ = write_series(&mut output, series);
    output
}

fn write_series(output: &mut String, series: &SeriesReport) -> fmt::Result {
    writeln!(output, "# Benchmark Series")?;
    writeln!(output)?;
    writeln!(
        output,
        "{} of {} runs completed ({}).",
        series.completed(),
        series.runs_requested,
        series.status()
    )?;
    writeln!(output)?;

    if let Some(scores) = series.scores {
        writeln!(output, "| Score | ops/s |")?;
        writeln!(output, "|-------|-------|")?;
        writeln!(output, "| Average | {} |", format::ops(scores.mean))?;
        writeln!(output, "| Best | {} |", format::ops(scores.max))?;
        writeln!(output, "| Worst | {} |", format::ops(scores.min))?;
        writeln!(output, "| Median | {} |", format::ops(scores.median))?;
        writeln!(output, "| Std Dev | {} |", format::ops(scores.stddev))?;
        writeln!(output)?;
    }

    writeln!(output, "| # | Run | Status | Iterations | Score (ops/s) |")?;
    writeln!(output, "|---|-----|--------|------------|---------------|")?;
    for (index, result) in series.results.iter().enumerate() {
        writeln!(
            output,
            "| {} | `{}` | {} | {} | {} |",
            index + 1,
            format::short_id(&result.id),
            result.status,
            result.raw_timing.iterations,
            format::ops(result.summary_stats.ops_per_second)
        )?;
    }
    Ok(())
}

fn write_result(output: &mut String, result: &BenchmarkResult) -> fmt::Result {
    writeln!(output, "# Benchmark Result")?;
    writeln!(output)?;
    writeln!(output, "| Field | Value |")?;
    writeln!(output, "|-------|-------|")?;
    writeln!(output, "| Run ID | `{}` |", result.id)?;
    writeln!(output, "| Workload | {} |", result.workload)?;
    writeln!(output, "| Status | {} |", result.status)?;
    writeln!(
        output,
        "| Iterations | {} of {} |",
        result.raw_timing.iterations, result.requested_iterations
    )?;
    writeln!(
        output,
        "| Elapsed | {:.3} s |",
        result.raw_timing.elapsed_nanos as f64 / 1e9
    )?;
    writeln!(
        output,
        "| Score | {} ops/s |",
        format::ops(result.summary_stats.ops_per_second)
    )?;
    writeln!(
        output,
        "| Started | {} |",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(
        output,
        "| Finished | {} |",
        result.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(output, "| Samples | {} |", result.sample_series.len())?;
    writeln!(output)?;

    writeln!(output, "## Telemetry")?;
    writeln!(output)?;
    if result.summary_stats.metrics.is_empty() {
        writeln!(output, "No telemetry was captured.")?;
    } else {
        writeln!(output, "| Metric | Min | Max | Mean | Median | Std Dev |")?;
        writeln!(output, "|--------|-----|-----|------|--------|---------|")?;
        for (metric, stats) in &result.summary_stats.metrics {
            let fmt = |v: f64| format::metric_value(*metric, v);
            writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} |",
                metric,
                fmt(stats.min),
                fmt(stats.max),
                fmt(stats.mean),
                fmt(stats.median),
                fmt(stats.stddev)
            )?;
        }
    }

    if !result.system_info.is_empty() {
        writeln!(output)?;
        writeln!(output, "## System")?;
        writeln!(output)?;
        writeln!(output, "| Key | Value |")?;
        writeln!(output, "|-----|-------|")?;
        for (key, value) in &result.system_info {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            writeln!(output, "| {key} | {value} |")?;
        }
    }

    Ok(())
}

fn write_history<'a, I>(output: &mut String, entries: I) -> fmt::Result
where
    I: IntoIterator<Item = &'a HistoryEntry>,
{
    writeln!(output, "# Benchmark History")?;
    writeln!(output)?;
    writeln!(output, "| Run | Finished | Workload | Status | Iterations | Score (ops/s) | CPU mean |")?;
    writeln!(output, "|-----|----------|----------|--------|------------|---------------|----------|")?;

    let mut total = 0;
    for entry in entries {
        let result = &entry.result;
        let cpu = result
            .summary_stats
            .get(Metric::CpuPercent)
            .map(|s| format::metric_value(Metric::CpuPercent, s.mean))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            output,
            "| `{}` | {} | {} | {} | {} | {} | {} |",
            format::short_id(&result.id),
            result.finished_at.format("%Y-%m-%d %H:%M:%S"),
            result.workload,
            result.status,
            result.raw_timing.iterations,
            format::ops(result.summary_stats.ops_per_second),
            cpu
        )?;
        total += 1;
    }

    writeln!(output)?;
    writeln!(output, "---")?;
    writeln!(output, "Total entries: {total}")
}

fn write_comparison(output: &mut String, comparison: &Comparison) -> fmt::Result {
    let a = &comparison.entry_a.result;
    let b = &comparison.entry_b.result;

    writeln!(output, "# Benchmark Comparison")?;
    writeln!(output)?;
    writeln!(
        output,
        "- **A:** `{}` ({}, {}, {})",
        a.id,
        a.workload,
        a.status,
        a.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(
        output,
        "- **B:** `{}` ({}, {}, {})",
        b.id,
        b.workload,
        b.status,
        b.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(output)?;
    writeln!(output, "| Statistic | A | B | Delta | Delta % |")?;
    writeln!(output, "|-----------|---|---|-------|---------|")?;

    let cell = |v: Option<f64>| v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string());
    for (name, delta) in &comparison.deltas {
        writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            name,
            cell(delta.a),
            cell(delta.b),
            delta.absolute.map(|v| format!("{v:+.3}")).unwrap_or_else(|| "-".to_string()),
            format::percent(delta.percent)
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stonebench_core::{MetricSample, RawTiming, RunStatus, StatsAggregator, WorkloadKind};
    use stonebench_storage::CURRENT_SCHEMA_VERSION;

    fn result(ops_scale: u64) -> BenchmarkResult {
        let timing = RawTiming::from_elapsed(10_000 * ops_scale, 100_000_000);
        let samples: Vec<MetricSample> = [40.0, 60.0]
            .iter()
            .enumerate()
            .map(|(i, cpu)| {
                let mut sample = MetricSample::at(i as u64);
                sample.cpu_percent = Some(*cpu);
                sample
            })
            .collect();
        let mut info = stonebench_core::SystemInfo::new();
        info.insert("os_name".into(), serde_json::json!("Linux"));
        BenchmarkResult::builder()
            .workload(WorkloadKind::Pystone)
            .summary_stats(StatsAggregator::aggregate(&timing, &samples).unwrap())
            .raw_timing(timing)
            .sample_series(samples)
            .status(RunStatus::Completed)
            .system_info(info)
            .build()
            .unwrap()
    }

    fn entry(result: BenchmarkResult) -> HistoryEntry {
        HistoryEntry {
            schema_version: CURRENT_SCHEMA_VERSION,
            seq: 0,
            appended_at: Utc::now(),
            result,
        }
    }

    #[test]
    fn test_render_result() {
        let report = render_result(&result(1));
        assert!(report.starts_with("# Benchmark Result"));
        assert!(report.contains("| Score | 100,000.0 ops/s |"));
        assert!(report.contains("| cpu_percent | 40.0% | 60.0% | 50.0% | 50.0% | 10.0% |"));
        assert!(report.contains("| os_name | Linux |"));
    }

    #[test]
    fn test_render_result_without_telemetry() {
        let bare = BenchmarkResult::builder()
            .raw_timing(RawTiming::from_elapsed(1, 1))
            .status(RunStatus::Cancelled)
            .build()
            .unwrap();
        let report = render_result(&bare);
        assert!(report.contains("No telemetry was captured."));
        assert!(!report.contains("## System"));
    }

    #[test]
    fn test_render_series() {
        let results = vec![result(1), result(3)];
        let scores: Vec<f64> = results.iter().map(|r| r.raw_timing.ops_per_second).collect();
        let series = SeriesReport {
            runs_requested: 2,
            scores: StatsAggregator::summarize_values(&scores),
            results,
        };

        let report = render_series(&series);
        assert!(report.contains("2 of 2 runs completed (completed)."));
        assert!(report.contains("| Average | 200,000.0 |"));
        assert!(report.contains("| Best | 300,000.0 |"));
        assert!(report.contains("| Worst | 100,000.0 |"));
        assert_eq!(report.lines().filter(|l| l.starts_with("| 1 |") || l.starts_with("| 2 |")).count(), 2);
    }

    #[test]
    fn test_render_history() {
        let entries = vec![entry(result(1)), entry(result(2))];
        let table = render_history(&entries);
        assert_eq!(table.lines().filter(|l| l.starts_with("| `")).count(), 2);
        assert!(table.contains("Total entries: 2"));
        assert!(table.contains("200,000.0"));
    }

    #[test]
    fn test_render_comparison() {
        let comparison = Comparison::between(entry(result(1)), entry(result(2)));
        let table = render_comparison(&comparison);
        assert!(table.contains("# Benchmark Comparison"));
        assert!(table.contains("| score.ops_per_second | 100000.000 | 200000.000 | +100000.000 | +100.00% |"));
    }
}
