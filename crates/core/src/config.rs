// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Orchestrator and per-run configuration.

use crate::error::{BenchError, Result};
use crate::sampler::DEFAULT_SAMPLE_INTERVAL;
use crate::workload::{WorkloadKind, DEFAULT_CHECK_EVERY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum spacing between progress publications.
pub const DEFAULT_PROGRESS_EVERY: Duration = Duration::from_millis(100);

/// Settings fixed for the lifetime of a [`crate::BenchmarkOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    sample_interval: Duration,
    cancel_check_every: u64,
    progress_every: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            cancel_check_every: DEFAULT_CHECK_EVERY,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl OrchestratorConfig {
    /// Validate and build a configuration.
    pub fn new(
        sample_interval: Duration,
        cancel_check_every: u64,
        progress_every: Duration,
    ) -> Result<Self> {
        if sample_interval.is_zero() {
            return Err(BenchError::invalid_argument("sample_interval must be non-zero"));
        }
        if cancel_check_every == 0 {
            return Err(BenchError::invalid_argument("cancel_check_every must be at least 1"));
        }
        if progress_every.is_zero() {
            return Err(BenchError::invalid_argument("progress_every must be non-zero"));
        }
        Ok(Self {
            sample_interval,
            cancel_check_every,
            progress_every,
        })
    }

    /// Sampler tick interval.
    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    /// Iterations between cancellation checks.
    pub fn cancel_check_every(&self) -> u64 {
        self.cancel_check_every
    }

    /// Minimum spacing between progress snapshots.
    pub fn progress_every(&self) -> Duration {
        self.progress_every
    }
}

/// Parameters of a single benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Workload to execute.
    pub workload: WorkloadKind,
    /// Iterations to execute; at least 1.
    pub iterations: u64,
    /// Optional deadline after which the run is cancelled.
    #[serde(default, with = "optional_millis")]
    pub timeout: Option<Duration>,
}

impl RunConfig {
    /// A run of `iterations` Pystone iterations without a deadline.
    pub fn new(iterations: u64) -> Self {
        Self {
            workload: WorkloadKind::default(),
            iterations,
            timeout: None,
        }
    }

    /// Use a different workload.
    pub fn with_workload(mut self, workload: WorkloadKind) -> Self {
        self.workload = workload;
        self
    }

    /// Cancel the run once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject configurations that cannot start.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(BenchError::invalid_argument("iterations must be at least 1"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(BenchError::invalid_argument("timeout must be non-zero when set"));
        }
        Ok(())
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
