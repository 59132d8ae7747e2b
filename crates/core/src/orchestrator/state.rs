// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run lifecycle state and progress snapshots.

use crate::types::{MetricSample, RunStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of the orchestrator's current (or most recent) run.
///
/// `Idle -> Starting -> Running -> {Completed | Cancelled | Failed}`. Any
/// terminal state accepts a new `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run has been started yet.
    #[default]
    Idle,
    /// Collecting system info and launching the runner and sampler.
    Starting,
    /// Runner and sampler are executing.
    Running,
    /// The run finished and its result was persisted.
    Completed,
    /// The run was cancelled; the partial result was persisted.
    Cancelled,
    /// The workload faulted or the result could not be persisted.
    Failed,
}

impl RunState {
    /// Whether a run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Starting | RunState::Running)
    }

    /// Whether this is one of the final states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled | RunState::Failed)
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RunStatus> for RunState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Cancelled => RunState::Cancelled,
            RunStatus::Failed => RunState::Failed,
        }
    }
}

/// Snapshot published on the orchestrator's progress channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    /// Run this snapshot belongs to; `None` before the first start.
    pub run_id: Option<Uuid>,
    /// Lifecycle state at the time of the snapshot.
    pub state: RunState,
    /// Iterations completed so far.
    pub iterations_done: u64,
    /// Iterations requested.
    pub iterations_total: u64,
    /// Time since the run started.
    pub elapsed: Duration,
    /// Most recent telemetry capture.
    pub latest_sample: Option<MetricSample>,
}

impl Progress {
    pub(crate) fn starting(run_id: Uuid, iterations_total: u64) -> Self {
        Self {
            run_id: Some(run_id),
            state: RunState::Starting,
            iterations_total,
            ..Self::default()
        }
    }

    /// Completed share of the requested iterations, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.iterations_total == 0 {
            return 0.0;
        }
        (self.iterations_done as f64 / self.iterations_total as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(!RunState::Idle.is_active());
        assert!(!RunState::Idle.is_terminal());
        assert!(RunState::Starting.is_active());
        assert!(RunState::Running.is_active());
        for state in [RunState::Completed, RunState::Cancelled, RunState::Failed] {
            assert!(state.is_terminal());
            assert!(!state.is_active());
        }
    }

    #[test]
    fn test_state_from_status() {
        assert_eq!(RunState::from(RunStatus::Cancelled), RunState::Cancelled);
        assert_eq!(RunState::Running.to_string(), "running");
    }

    #[test]
    fn test_progress_fraction() {
        let mut progress = Progress::starting(Uuid::new_v4(), 200);
        assert_eq!(progress.fraction(), 0.0);
        progress.iterations_done = 50;
        assert_eq!(progress.fraction(), 0.25);
        assert_eq!(Progress::default().fraction(), 0.0);
    }
}
