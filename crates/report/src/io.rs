//! I/O operations for benchmark results.
//!
//! Single results are exported as pretty-printed JSON; history listings and
//! comparisons can be exported the same way or as Markdown. Results can also
//! be flattened into CSV, one row per run.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use stonebench_core::{BenchmarkResult, Metric, RunStatus, StatsAggregator};

/// Create the parent directory of `path` if needed.
fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    json.push('\n');
    fs::write(path, json)
}

/// Export one result to a JSON file.
pub fn export_result(result: &BenchmarkResult, path: impl AsRef<Path>) -> io::Result<()> {
    write_json(result, path)
}

/// Read a result previously written by [`export_result`].
pub fn read_result(path: impl AsRef<Path>) -> io::Result<BenchmarkResult> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Leading CSV columns; metric and `metadata_*` columns follow.
pub const CSV_HEADER: [&str; 14] = [
    "name",
    "score",
    "unit",
    "iterations",
    "min",
    "max",
    "mean",
    "median",
    "stdev",
    "id",
    "status",
    "elapsed_seconds",
    "started_at",
    "finished_at",
];

/// Export results as CSV, one row per result.
///
/// `min` through `stdev` describe the scores of the completed results in the
/// file, so a single-run export repeats its score there. Per-metric means and
/// maxima follow, then one `metadata_<key>` column per system info key seen
/// in any result.
pub fn export_csv(results: &[BenchmarkResult], path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    write_csv(results, File::create(path)?)
}

/// Write results as CSV to any writer. See [`export_csv`].
pub fn write_csv<W: io::Write>(results: &[BenchmarkResult], writer: W) -> io::Result<()> {
    let scores: Vec<f64> = results
        .iter()
        .filter(|r| r.status == RunStatus::Completed)
        .map(|r| r.summary_stats.ops_per_second)
        .collect();
    let spread = StatsAggregator::summarize_values(&scores);

    let metrics: Vec<Metric> = Metric::ALL
        .into_iter()
        .filter(|metric| results.iter().any(|r| r.summary_stats.get(*metric).is_some()))
        .collect();
    let metadata: BTreeSet<&str> = results
        .iter()
        .flat_map(|r| r.system_info.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = CSV_HEADER.iter().map(|c| c.to_string()).collect();
    for metric in &metrics {
        header.push(format!("{metric}_mean"));
        header.push(format!("{metric}_max"));
    }
    header.extend(metadata.iter().map(|key| format!("metadata_{key}")));
    wtr.write_record(&header).map_err(io::Error::other)?;

    let cell = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    for result in results {
        let mut row = vec![
            result.workload.to_string(),
            result.summary_stats.ops_per_second.to_string(),
            "ops/s".to_string(),
            result.raw_timing.iterations.to_string(),
            cell(spread.map(|s| s.min)),
            cell(spread.map(|s| s.max)),
            cell(spread.map(|s| s.mean)),
            cell(spread.map(|s| s.median)),
            cell(spread.map(|s| s.stddev)),
            result.id.to_string(),
            result.status.to_string(),
            (result.raw_timing.elapsed_nanos as f64 / 1e9).to_string(),
            result.started_at.to_rfc3339(),
            result.finished_at.to_rfc3339(),
        ];
        for metric in &metrics {
            let stats = result.summary_stats.get(*metric);
            row.push(cell(stats.map(|s| s.mean)));
            row.push(cell(stats.map(|s| s.max)));
        }
        for key in &metadata {
            row.push(match result.system_info.get(*key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            });
        }
        wtr.write_record(&row).map_err(io::Error::other)?;
    }

    wtr.flush()
}

/// Write a rendered Markdown document.
pub fn write_markdown(markdown: &str, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, markdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stonebench_core::{MetricSample, RawTiming};
    use tempfile::TempDir;

    fn result() -> BenchmarkResult {
        let mut sample = MetricSample::at(0);
        sample.cpu_percent = Some(71.0);
        let timing = RawTiming::from_elapsed(50_000, 310_000_000);
        let summary = StatsAggregator::aggregate(&timing, std::slice::from_ref(&sample)).unwrap();
        BenchmarkResult::builder()
            .raw_timing(timing)
            .sample_series(vec![sample])
            .summary_stats(summary)
            .status(RunStatus::Completed)
            .build()
            .unwrap()
    }

    #[test]
    fn test_export_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exports").join("run.json");
        let original = result();

        export_result(&original, &path).unwrap();
        let loaded = read_result(&path).unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.sample_series[0].cpu_percent, Some(71.0));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"raw_timing\""));
    }

    #[test]
    fn test_read_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"id\": 3 }").unwrap();
        let err = read_result(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_csv_column_order_and_metadata() {
        let mut first = result();
        first.system_info.insert("hostname".into(), serde_json::json!("bench-01"));
        first.system_info.insert("logical_cores".into(), serde_json::json!(8));
        let mut second = result();
        second.summary_stats.ops_per_second *= 2.0;

        let mut out = Vec::new();
        write_csv(&[first.clone(), second], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&header[..9], &["name", "score", "unit", "iterations", "min", "max", "mean", "median", "stdev"]);
        assert_eq!(&header[header.len() - 2..], &["metadata_hostname", "metadata_logical_cores"]);

        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row.len(), header.len());
        assert_eq!(row[0], "pystone");
        assert_eq!(row[2], "ops/s");
        assert_eq!(row[3], "50000");
        assert_eq!(row[4].parse::<f64>().unwrap(), first.summary_stats.ops_per_second);
        assert_eq!(row[5].parse::<f64>().unwrap(), first.summary_stats.ops_per_second * 2.0);
        assert_eq!(row[row.len() - 2], "bench-01");
        assert_eq!(row[row.len() - 1], "8");

        let second_row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(second_row[second_row.len() - 1], "");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_csv_of_single_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("csv").join("run.csv");
        let only = result();
        export_csv(std::slice::from_ref(&only), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
        assert!(header.contains(&"cpu_percent_mean"));
        let row: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        let score = only.summary_stats.ops_per_second;
        assert_eq!(row[6].parse::<f64>().unwrap(), score);
        assert_eq!(row[8].parse::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn test_write_markdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        write_markdown("# Report\n", &path).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "# Report\n");
    }
}
