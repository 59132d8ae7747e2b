// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Where finished runs are written.

use crate::error::SinkError;
use crate::types::BenchmarkResult;

/// Durable destination for finished results.
///
/// The orchestrator calls [`ResultSink::append`] once per run that reached
/// `Completed` or `Cancelled`. Implementations must serialize concurrent
/// appends themselves.
#[cfg_attr(test, mockall::automock)]
pub trait ResultSink: Send + Sync {
    /// Persist `result`.
    fn append(&self, result: &BenchmarkResult) -> Result<(), SinkError>;
}

/// A sink that keeps nothing, for runs that should not enter history.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl ResultSink for DiscardSink {
    fn append(&self, result: &BenchmarkResult) -> Result<(), SinkError> {
        tracing::debug!(run_id = %result.id, "Result not persisted");
        Ok(())
    }
}
