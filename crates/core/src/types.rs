// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Result types shared by the runner, sampler, aggregator and store.
//!
//! Everything here is produced once and then only read: a [`RawTiming`] by
//! the workload runner, a series of [`MetricSample`]s by the sampler, and a
//! [`BenchmarkResult`] by the orchestrator when a run ends.
//!
//! # Invariants
//!
//! - Sample offsets within a series never decrease.
//! - A metric that was never observed has no entry in [`SummaryStats`]; it
//!   is never reported as zero.

use crate::error::{BenchError, Result};
use crate::workload::WorkloadKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque host description attached to every result.
pub type SystemInfo = BTreeMap<String, serde_json::Value>;

/// Terminal status of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every requested iteration ran and the result was stored.
    Completed,
    /// The run was stopped early by `cancel()` or by its deadline.
    Cancelled,
    /// The workload faulted, or the result could not be persisted.
    Failed,
}

impl RunStatus {
    /// All statuses, in declaration order.
    pub const ALL: [RunStatus; 3] = [RunStatus::Completed, RunStatus::Cancelled, RunStatus::Failed];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BenchError::invalid_argument(format!("unknown run status '{s}'")))
    }
}

/// Timing of one workload execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTiming {
    /// Iterations actually executed (less than requested when cancelled).
    pub iterations: u64,
    /// Wall-clock nanoseconds spent in the measured loop.
    pub elapsed_nanos: u64,
    /// Iterations per second; the run's primary score.
    pub ops_per_second: f64,
}

impl RawTiming {
    /// Build a timing from an iteration count and elapsed nanoseconds.
    ///
    /// Elapsed time is clamped to at least one nanosecond so that the score
    /// of a non-empty run is always positive and finite.
    pub fn from_elapsed(iterations: u64, elapsed_nanos: u64) -> Self {
        let elapsed_nanos = elapsed_nanos.max(1);
        let ops_per_second = iterations as f64 / (elapsed_nanos as f64 / 1e9);
        Self {
            iterations,
            elapsed_nanos,
            ops_per_second,
        }
    }
}

/// A sampled host metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Global CPU load, percent.
    CpuPercent,
    /// Physical memory in use, bytes.
    MemoryUsedBytes,
    /// Disk read + write throughput, bytes per second.
    DiskIoBytesPerSec,
    /// Network receive + transmit throughput, bytes per second.
    NetworkIoBytesPerSec,
    /// Hottest CPU sensor, degrees Celsius.
    CpuTemperatureCelsius,
}

impl Metric {
    /// All metrics, in declaration order.
    pub const ALL: [Metric; 5] = [
        Metric::CpuPercent,
        Metric::MemoryUsedBytes,
        Metric::DiskIoBytesPerSec,
        Metric::NetworkIoBytesPerSec,
        Metric::CpuTemperatureCelsius,
    ];

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::CpuPercent => "cpu_percent",
            Metric::MemoryUsedBytes => "memory_used_bytes",
            Metric::DiskIoBytesPerSec => "disk_io_bytes_per_sec",
            Metric::NetworkIoBytesPerSec => "network_io_bytes_per_sec",
            Metric::CpuTemperatureCelsius => "cpu_temperature_celsius",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry capture. Fields are `None` when the host could not supply them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Nanoseconds since the sampler started (monotonic clock).
    pub offset_nanos: u64,
    /// Wall-clock capture time.
    pub captured_at: DateTime<Utc>,
    /// Global CPU load, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    /// Physical memory in use, bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used_bytes: Option<f64>,
    /// Disk throughput since the previous capture, bytes per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_io_bytes_per_sec: Option<f64>,
    /// Network throughput since the previous capture, bytes per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_io_bytes_per_sec: Option<f64>,
    /// Hottest CPU sensor, degrees Celsius. Absent on hosts without sensors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_temperature_celsius: Option<f64>,
}

impl MetricSample {
    /// An empty sample at the given offset.
    pub fn at(offset_nanos: u64) -> Self {
        Self {
            offset_nanos,
            captured_at: Utc::now(),
            cpu_percent: None,
            memory_used_bytes: None,
            disk_io_bytes_per_sec: None,
            network_io_bytes_per_sec: None,
            cpu_temperature_celsius: None,
        }
    }

    /// Value of `metric` in this sample, if captured.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::CpuPercent => self.cpu_percent,
            Metric::MemoryUsedBytes => self.memory_used_bytes,
            Metric::DiskIoBytesPerSec => self.disk_io_bytes_per_sec,
            Metric::NetworkIoBytesPerSec => self.network_io_bytes_per_sec,
            Metric::CpuTemperatureCelsius => self.cpu_temperature_celsius,
        }
    }

    /// Set the value of `metric`.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::CpuPercent => &mut self.cpu_percent,
            Metric::MemoryUsedBytes => &mut self.memory_used_bytes,
            Metric::DiskIoBytesPerSec => &mut self.disk_io_bytes_per_sec,
            Metric::NetworkIoBytesPerSec => &mut self.network_io_bytes_per_sec,
            Metric::CpuTemperatureCelsius => &mut self.cpu_temperature_celsius,
        };
        *slot = value;
    }
}

/// Distribution of one sampled metric over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Smallest observed value.
    pub min: f64,
    /// Largest observed value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (midpoint of the two central values for even counts).
    pub median: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Number of samples that carried this metric.
    #[serde(default)]
    pub count: usize,
}

impl StatSummary {
    /// Named statistics, in a fixed order.
    pub fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("min", self.min),
            ("max", self.max),
            ("mean", self.mean),
            ("median", self.median),
            ("stddev", self.stddev),
        ]
    }
}

/// Aggregated statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Primary score carried through from [`RawTiming::ops_per_second`].
    #[serde(default)]
    pub ops_per_second: f64,
    /// Per-metric distributions. Metrics never sampled have no entry.
    #[serde(default)]
    pub metrics: BTreeMap<Metric, StatSummary>,
}

impl SummaryStats {
    /// Distribution for `metric`, if it was ever sampled.
    pub fn get(&self, metric: Metric) -> Option<&StatSummary> {
        self.metrics.get(&metric)
    }
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Unique run identifier (UUID v4).
    pub id: Uuid,
    /// Workload that was measured.
    #[serde(default)]
    pub workload: WorkloadKind,
    /// Iterations the caller asked for.
    #[serde(default)]
    pub requested_iterations: u64,
    /// When the run was started.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal state.
    pub finished_at: DateTime<Utc>,
    /// Timing produced by the workload runner.
    pub raw_timing: RawTiming,
    /// Telemetry captured while the workload ran, in capture order.
    #[serde(default)]
    pub sample_series: Vec<MetricSample>,
    /// Statistics derived from `raw_timing` and `sample_series`.
    #[serde(default)]
    pub summary_stats: SummaryStats,
    /// Terminal status.
    pub status: RunStatus,
    /// Host description supplied by the system-info collaborator.
    #[serde(default)]
    pub system_info: SystemInfo,
}

impl BenchmarkResult {
    /// Create a new builder.
    pub fn builder() -> BenchmarkResultBuilder {
        BenchmarkResultBuilder::default()
    }

    /// Wall-clock duration of the whole run, including setup and teardown.
    pub fn wall_duration(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }

    /// Whether the run completed every requested iteration.
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Builder for [`BenchmarkResult`] instances.
#[derive(Default)]
pub struct BenchmarkResultBuilder {
    id: Option<Uuid>,
    workload: WorkloadKind,
    requested_iterations: Option<u64>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    raw_timing: Option<RawTiming>,
    sample_series: Vec<MetricSample>,
    summary_stats: Option<SummaryStats>,
    status: Option<RunStatus>,
    system_info: SystemInfo,
}

impl BenchmarkResultBuilder {
    /// Set the run ID. If not set, a UUID v4 will be generated.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the workload kind (default: Pystone).
    pub fn workload(mut self, workload: WorkloadKind) -> Self {
        self.workload = workload;
        self
    }

    /// Set the requested iteration count. Defaults to the executed count.
    pub fn requested_iterations(mut self, iterations: u64) -> Self {
        self.requested_iterations = Some(iterations);
        self
    }

    /// Set start time. Defaults to `Utc::now()` if not set.
    pub fn started_at(mut self, time: DateTime<Utc>) -> Self {
        self.started_at = Some(time);
        self
    }

    /// Set finish time. Defaults to `Utc::now()` if not set.
    pub fn finished_at(mut self, time: DateTime<Utc>) -> Self {
        self.finished_at = Some(time);
        self
    }

    /// Set the raw timing (required).
    pub fn raw_timing(mut self, timing: RawTiming) -> Self {
        self.raw_timing = Some(timing);
        self
    }

    /// Set the sample series.
    pub fn sample_series(mut self, samples: Vec<MetricSample>) -> Self {
        self.sample_series = samples;
        self
    }

    /// Set the summary statistics. Defaults to the score alone.
    pub fn summary_stats(mut self, stats: SummaryStats) -> Self {
        self.summary_stats = Some(stats);
        self
    }

    /// Set the terminal status (required).
    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the system-info snapshot.
    pub fn system_info(mut self, info: SystemInfo) -> Self {
        self.system_info = info;
        self
    }

    /// Build the [`BenchmarkResult`]. Returns `Err` if required fields are
    /// missing or the timestamps are inconsistent.
    pub fn build(self) -> Result<BenchmarkResult> {
        let raw_timing = self
            .raw_timing
            .ok_or_else(|| BenchError::invalid_argument("raw_timing is required"))?;
        let status = self
            .status
            .ok_or_else(|| BenchError::invalid_argument("status is required"))?;
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let finished_at = self.finished_at.unwrap_or_else(Utc::now);

        if finished_at < started_at {
            return Err(BenchError::invalid_argument(
                "finished_at must not precede started_at",
            ));
        }

        if self
            .sample_series
            .windows(2)
            .any(|pair| pair[1].offset_nanos < pair[0].offset_nanos)
        {
            return Err(BenchError::invalid_argument(
                "sample_series timestamps must be non-decreasing",
            ));
        }

        let summary_stats = self.summary_stats.unwrap_or_else(|| SummaryStats {
            ops_per_second: raw_timing.ops_per_second,
            metrics: BTreeMap::new(),
        });

        Ok(BenchmarkResult {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            workload: self.workload,
            requested_iterations: self.requested_iterations.unwrap_or(raw_timing.iterations),
            started_at,
            finished_at,
            raw_timing,
            sample_series: self.sample_series,
            summary_stats,
            status,
            system_info: self.system_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> RawTiming {
        RawTiming::from_elapsed(1_000, 2_000_000)
    }

    #[test]
    fn test_raw_timing_score() {
        let timing = RawTiming::from_elapsed(1_000, 500_000_000);
        assert_eq!(timing.iterations, 1_000);
        assert!((timing.ops_per_second - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_raw_timing_clamps_zero_elapsed() {
        let timing = RawTiming::from_elapsed(10, 0);
        assert_eq!(timing.elapsed_nanos, 1);
        assert!(timing.ops_per_second.is_finite());
        assert!(timing.ops_per_second > 0.0);
    }

    #[test]
    fn test_builder_generates_uuid() {
        let result = BenchmarkResult::builder()
            .raw_timing(timing())
            .status(RunStatus::Completed)
            .build()
            .unwrap();
        assert!(!result.id.is_nil());
        assert_eq!(result.requested_iterations, 1_000);
        assert_eq!(result.summary_stats.ops_per_second, timing().ops_per_second);
        assert!(result.summary_stats.metrics.is_empty());
    }

    #[test]
    fn test_builder_requires_raw_timing() {
        let result = BenchmarkResult::builder().status(RunStatus::Completed).build();
        assert!(result.unwrap_err().to_string().contains("raw_timing"));
    }

    #[test]
    fn test_builder_requires_status() {
        let result = BenchmarkResult::builder().raw_timing(timing()).build();
        assert!(result.unwrap_err().to_string().contains("status"));
    }

    #[test]
    fn test_builder_rejects_inverted_timestamps() {
        let now = Utc::now();
        let result = BenchmarkResult::builder()
            .raw_timing(timing())
            .status(RunStatus::Completed)
            .started_at(now)
            .finished_at(now - chrono::Duration::seconds(1))
            .build();
        assert!(matches!(result, Err(BenchError::InvalidArgument(_))));
    }

    #[test]
    fn test_builder_rejects_unordered_samples() {
        let result = BenchmarkResult::builder()
            .raw_timing(timing())
            .status(RunStatus::Completed)
            .sample_series(vec![MetricSample::at(20), MetricSample::at(10)])
            .build();
        assert!(result.unwrap_err().to_string().contains("non-decreasing"));
    }

    #[test]
    fn test_run_status_parse() {
        assert_eq!("Cancelled".parse::<RunStatus>().unwrap(), RunStatus::Cancelled);
        assert_eq!(" failed ".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("running".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_sample_omits_absent_fields() {
        let mut sample = MetricSample::at(5);
        sample.set(Metric::CpuPercent, Some(12.5));
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["cpu_percent"], serde_json::json!(12.5));
        assert!(json.get("memory_used_bytes").is_none());
        assert_eq!(sample.value(Metric::MemoryUsedBytes), None);
    }

    #[test]
    fn test_sample_without_temperature_still_loads() {
        let json = serde_json::json!({
            "offset_nanos": 10,
            "captured_at": Utc::now(),
            "cpu_percent": 3.0
        });
        let mut sample: MetricSample = serde_json::from_value(json).unwrap();
        assert_eq!(sample.value(Metric::CpuTemperatureCelsius), None);

        sample.set(Metric::CpuTemperatureCelsius, Some(61.5));
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["cpu_temperature_celsius"], serde_json::json!(61.5));
        assert_eq!(Metric::CpuTemperatureCelsius.to_string(), "cpu_temperature_celsius");
    }

    #[test]
    fn test_result_tolerates_missing_optional_fields() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "started_at": Utc::now(),
            "finished_at": Utc::now(),
            "raw_timing": { "iterations": 10, "elapsed_nanos": 100, "ops_per_second": 1e8 },
            "status": "cancelled"
        });
        let result: BenchmarkResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.workload, WorkloadKind::Pystone);
        assert!(result.sample_series.is_empty());
        assert!(result.system_info.is_empty());
    }

    #[test]
    fn test_summary_map_keys_serialize_as_names() {
        let mut stats = SummaryStats::default();
        stats.metrics.insert(
            Metric::CpuPercent,
            StatSummary {
                min: 1.0,
                max: 2.0,
                mean: 1.5,
                median: 1.5,
                stddev: 0.5,
                count: 2,
            },
        );
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"cpu_percent\""));
        let back: SummaryStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
