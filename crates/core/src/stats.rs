// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Summary statistics over a run's timing and telemetry.

use crate::error::{BenchError, Result};
use crate::types::{Metric, MetricSample, RawTiming, StatSummary, SummaryStats};
use std::collections::BTreeMap;

/// Combines runner output and sampler output into [`SummaryStats`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsAggregator;

impl StatsAggregator {
    /// Aggregate a run.
    ///
    /// The score is carried through from `timing` unchanged. Every metric
    /// present in at least one sample gets a [`StatSummary`]; metrics that
    /// were never captured are left out of the map.
    pub fn aggregate(timing: &RawTiming, samples: &[MetricSample]) -> Result<SummaryStats> {
        validate_timing(timing)?;
        validate_samples(samples)?;

        let mut metrics = BTreeMap::new();
        for metric in Metric::ALL {
            let values: Vec<f64> = samples.iter().filter_map(|s| s.value(metric)).collect();
            if let Some(summary) = summarize(&values) {
                metrics.insert(metric, summary);
            }
        }

        Ok(SummaryStats {
            ops_per_second: timing.ops_per_second,
            metrics,
        })
    }

    /// Summary of arbitrary values, such as the scores of a run series.
    /// Non-finite values are ignored; `None` when nothing is left.
    pub fn summarize_values(values: &[f64]) -> Option<StatSummary> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        summarize(&finite)
    }
}

fn validate_timing(timing: &RawTiming) -> Result<()> {
    if timing.iterations == 0 {
        return Err(BenchError::invalid_argument("raw timing must cover at least one iteration"));
    }
    if !timing.ops_per_second.is_finite() || timing.ops_per_second < 0.0 {
        return Err(BenchError::invalid_argument(format!(
            "ops_per_second must be a non-negative number, got {}",
            timing.ops_per_second
        )));
    }
    Ok(())
}

fn validate_samples(samples: &[MetricSample]) -> Result<()> {
    if samples
        .windows(2)
        .any(|pair| pair[1].offset_nanos < pair[0].offset_nanos)
    {
        return Err(BenchError::invalid_argument("sample offsets must be non-decreasing"));
    }

    for (index, sample) in samples.iter().enumerate() {
        for metric in Metric::ALL {
            if let Some(value) = sample.value(metric) {
                if !value.is_finite() || value < 0.0 {
                    return Err(BenchError::invalid_argument(format!(
                        "sample {index} has invalid {metric} value {value}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Min, max, mean, median and population standard deviation of `values`.
fn summarize(values: &[f64]) -> Option<StatSummary> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    Some(StatSummary {
        min: sorted[0],
        max: sorted[count - 1],
        mean,
        median,
        stddev: variance.sqrt(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> RawTiming {
        RawTiming::from_elapsed(50_000, 250_000_000)
    }

    fn cpu_series(values: &[f64]) -> Vec<MetricSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut sample = MetricSample::at(i as u64 * 1_000);
                sample.cpu_percent = Some(*v);
                sample
            })
            .collect()
    }

    #[test]
    fn test_empty_series_has_no_metrics() {
        let stats = StatsAggregator::aggregate(&timing(), &[]).unwrap();
        assert!(stats.metrics.is_empty());
        assert_eq!(stats.ops_per_second, timing().ops_per_second);
    }

    #[test]
    fn test_odd_count() {
        let stats = StatsAggregator::aggregate(&timing(), &cpu_series(&[30.0, 10.0, 20.0])).unwrap();
        let cpu = stats.get(Metric::CpuPercent).unwrap();
        assert_eq!(cpu.min, 10.0);
        assert_eq!(cpu.max, 30.0);
        assert_eq!(cpu.mean, 20.0);
        assert_eq!(cpu.median, 20.0);
        assert_eq!(cpu.count, 3);
        assert!((cpu.stddev - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_even_count_median_is_midpoint() {
        let stats =
            StatsAggregator::aggregate(&timing(), &cpu_series(&[4.0, 1.0, 3.0, 2.0])).unwrap();
        let cpu = stats.get(Metric::CpuPercent).unwrap();
        assert_eq!(cpu.median, 2.5);
        assert_eq!(cpu.mean, 2.5);
        assert!((cpu.stddev - 1.25f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_has_zero_spread() {
        let stats = StatsAggregator::aggregate(&timing(), &cpu_series(&[42.0])).unwrap();
        let cpu = stats.get(Metric::CpuPercent).unwrap();
        assert_eq!(cpu.stddev, 0.0);
        assert_eq!(cpu.median, 42.0);
    }

    #[test]
    fn test_partially_present_metric() {
        let mut samples = cpu_series(&[10.0, 20.0]);
        samples[1].memory_used_bytes = Some(1_024.0);
        let stats = StatsAggregator::aggregate(&timing(), &samples).unwrap();

        let memory = stats.get(Metric::MemoryUsedBytes).unwrap();
        assert_eq!(memory.count, 1);
        assert_eq!(memory.mean, 1_024.0);
        assert!(stats.get(Metric::DiskIoBytesPerSec).is_none());
        assert!(stats.get(Metric::NetworkIoBytesPerSec).is_none());
    }

    #[test]
    fn test_summarize_values_skips_non_finite() {
        let summary = StatsAggregator::summarize_values(&[120.0, f64::NAN, 80.0, 100.0]).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 80.0);
        assert_eq!(summary.max, 120.0);
        assert_eq!(summary.mean, 100.0);
        assert!(StatsAggregator::summarize_values(&[f64::INFINITY]).is_none());
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let bad = RawTiming {
            iterations: 0,
            elapsed_nanos: 10,
            ops_per_second: 0.0,
        };
        assert!(matches!(
            StatsAggregator::aggregate(&bad, &[]),
            Err(BenchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_negative_values() {
        let bad = RawTiming {
            iterations: 1,
            elapsed_nanos: 10,
            ops_per_second: -1.0,
        };
        assert!(StatsAggregator::aggregate(&bad, &[]).is_err());
        assert!(StatsAggregator::aggregate(&timing(), &cpu_series(&[5.0, -1.0])).is_err());
        assert!(StatsAggregator::aggregate(&timing(), &cpu_series(&[f64::NAN])).is_err());
    }

    #[test]
    fn test_rejects_unordered_series() {
        let mut samples = cpu_series(&[1.0, 2.0]);
        samples[1].offset_nanos = 0;
        samples[0].offset_nanos = 5;
        assert!(StatsAggregator::aggregate(&timing(), &samples).is_err());
    }
}
