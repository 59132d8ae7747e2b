// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Back-to-back runs of one configuration.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::error::{BenchError, Result};
use crate::stats::StatsAggregator;
use crate::types::{BenchmarkResult, RunStatus, StatSummary};

use super::executor::BenchmarkOrchestrator;

/// Outcome of [`BenchmarkOrchestrator::run_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    /// Runs asked for.
    pub runs_requested: u32,
    /// Every run that reached a result, in execution order. The last one may
    /// be `Cancelled`, or `Failed` when it could not be saved.
    pub results: Vec<BenchmarkResult>,
    /// Distribution of ops/s over the completed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<StatSummary>,
}

impl SeriesReport {
    fn new(runs_requested: u32, results: Vec<BenchmarkResult>) -> Self {
        let completed: Vec<f64> = results
            .iter()
            .filter(|r| r.status == RunStatus::Completed)
            .map(|r| r.raw_timing.ops_per_second)
            .collect();
        Self {
            runs_requested,
            scores: StatsAggregator::summarize_values(&completed),
            results,
        }
    }

    /// Mean ops/s of the completed runs.
    pub fn average(&self) -> Option<f64> {
        self.scores.map(|s| s.mean)
    }

    /// Highest ops/s of the completed runs.
    pub fn best(&self) -> Option<f64> {
        self.scores.map(|s| s.max)
    }

    /// Lowest ops/s of the completed runs.
    pub fn worst(&self) -> Option<f64> {
        self.scores.map(|s| s.min)
    }

    /// Number of completed runs.
    pub fn completed(&self) -> usize {
        self.scores.map_or(0, |s| s.count)
    }

    /// `Completed` only when every requested run completed; otherwise the
    /// status of the run that ended the series.
    pub fn status(&self) -> RunStatus {
        match self.results.last() {
            Some(last) if last.status != RunStatus::Completed => last.status,
            Some(_) if self.results.len() == self.runs_requested as usize => RunStatus::Completed,
            _ => RunStatus::Cancelled,
        }
    }
}

impl BenchmarkOrchestrator {
    /// Run `config` `runs` times in a row, saving each result as it lands.
    ///
    /// The series ends early when a run is cancelled (including by its own
    /// deadline), when a result cannot be saved, or when `stop` fires; the
    /// report then holds the runs so far. Cancelling `stop` also cancels the
    /// run in flight. Workload faults are returned as errors.
    pub async fn run_series(&self, config: RunConfig, runs: u32, stop: &CancellationToken) -> Result<SeriesReport> {
        if runs == 0 {
            return Err(BenchError::invalid_argument("runs must be at least 1"));
        }
        config.validate()?;

        let relay = {
            let orchestrator = self.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                stop.cancelled().await;
                orchestrator.cancel();
            })
        };

        let mut results = Vec::with_capacity(runs as usize);
        let outcome = loop {
            if results.len() == runs as usize {
                break Ok(());
            }
            if stop.is_cancelled() {
                tracing::info!(completed = results.len(), "Series stopped before the next run");
                break Ok(());
            }

            let index = results.len() + 1;
            let handle = match self.start(config) {
                Ok(handle) => handle,
                Err(e) => break Err(e),
            };
            // A stop that landed between the check and the start.
            if stop.is_cancelled() {
                self.cancel();
            }
            tracing::info!(run = index, runs, run_id = %handle.run_id(), "Series run started");

            match handle.wait().await {
                Ok(result) => {
                    let status = result.status;
                    results.push(result);
                    if status != RunStatus::Completed {
                        break Ok(());
                    }
                }
                Err(BenchError::Persistence { source, result }) => {
                    tracing::warn!(run = index, error = %source, "Series stopped, result not saved");
                    results.push(*result);
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        relay.abort();
        outcome?;

        let report = SeriesReport::new(runs, results);
        tracing::info!(
            runs = report.results.len(),
            completed = report.completed(),
            average = ?report.average(),
            best = ?report.best(),
            worst = ?report.worst(),
            "Series finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawTiming;

    fn result(ops: f64, status: RunStatus) -> BenchmarkResult {
        BenchmarkResult::builder()
            .raw_timing(RawTiming {
                iterations: 100,
                elapsed_nanos: 1_000,
                ops_per_second: ops,
            })
            .status(status)
            .build()
            .unwrap()
    }

    #[test]
    fn test_scores_cover_completed_runs_only() {
        let report = SeriesReport::new(
            3,
            vec![
                result(900.0, RunStatus::Completed),
                result(1_100.0, RunStatus::Completed),
                result(10.0, RunStatus::Cancelled),
            ],
        );
        assert_eq!(report.completed(), 2);
        assert_eq!(report.average(), Some(1_000.0));
        assert_eq!(report.best(), Some(1_100.0));
        assert_eq!(report.worst(), Some(900.0));
        assert_eq!(report.status(), RunStatus::Cancelled);
    }

    #[test]
    fn test_status_of_full_and_empty_series() {
        let full = SeriesReport::new(2, vec![result(1.0, RunStatus::Completed), result(2.0, RunStatus::Completed)]);
        assert_eq!(full.status(), RunStatus::Completed);

        let short = SeriesReport::new(3, vec![result(1.0, RunStatus::Completed)]);
        assert_eq!(short.status(), RunStatus::Cancelled);

        let unsaved = SeriesReport::new(2, vec![result(1.0, RunStatus::Failed)]);
        assert_eq!(unsaved.status(), RunStatus::Failed);
        assert_eq!(unsaved.average(), None);

        let empty = SeriesReport::new(2, Vec::new());
        assert_eq!(empty.status(), RunStatus::Cancelled);
        assert_eq!(empty.completed(), 0);
    }
}
