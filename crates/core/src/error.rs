// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the benchmark core.
//!
//! [`BenchError`] is what callers of the runner, aggregator and orchestrator
//! see. [`SamplingError`] never leaves the sampler: a failing metric source
//! only degrades the affected field of a sample to "absent".

use crate::types::BenchmarkResult;
use thiserror::Error;

/// Boxed error produced by a [`crate::ResultSink`] implementation.
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the benchmark core.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Bad configuration or malformed input, rejected before any work starts.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The workload hit an unrecoverable fault. No history entry is written.
    #[error("Workload execution failed: {0}")]
    Execution(String),

    /// Another run is already starting or running on this orchestrator.
    #[error("A benchmark run is already in flight (state: {state})")]
    Conflict {
        /// State the orchestrator was in when the start was rejected.
        state: crate::RunState,
    },

    /// The run finished but its result could not be appended to history.
    ///
    /// The in-memory result is valid and handed back to the caller unsaved.
    #[error("Result {} was computed but not saved: {source}", .result.id)]
    Persistence {
        /// Underlying store failure.
        #[source]
        source: SinkError,
        /// The computed result, retained in memory.
        result: Box<BenchmarkResult>,
    },
}

impl BenchError {
    /// Shorthand for [`BenchError::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        BenchError::InvalidArgument(msg.into())
    }

    /// Shorthand for [`BenchError::Execution`].
    pub fn execution(msg: impl Into<String>) -> Self {
        BenchError::Execution(msg.into())
    }

    /// The unsaved in-memory result carried by a persistence failure.
    pub fn unsaved_result(&self) -> Option<&BenchmarkResult> {
        match self {
            BenchError::Persistence { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// A single telemetry source failed during one sampler tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SamplingError {
    /// The host does not expose this metric.
    #[error("{0} is not available on this host")]
    Unavailable(&'static str),

    /// Reading the metric failed.
    #[error("failed to read {metric}: {reason}")]
    Read {
        /// Metric being read.
        metric: &'static str,
        /// Cause reported by the source.
        reason: String,
    },
}
