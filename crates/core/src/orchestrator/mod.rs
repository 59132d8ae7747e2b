// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run lifecycle management.
//!
//! The orchestrator drives one run at a time:
//! - the workload runner on a blocking thread
//! - the metrics sampler on its own task
//! - an optional deadline that cancels the run
//! - aggregation and persistence once both tasks have joined
//!
//! [`BenchmarkOrchestrator::run_series`] repeats a configuration and
//! summarizes the scores.
//!
//! Progress is published on a `watch` channel; callers that only care about
//! the outcome await the [`RunHandle`].
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = OrchestratorBuilder::new().sink(sink).build()?;
//! let handle = orchestrator.start(RunConfig::new(50_000))?;
//! let mut progress = orchestrator.subscribe();
//! let result = handle.wait().await?;
//! ```

mod builder;
mod executor;
mod series;
mod state;

pub use builder::OrchestratorBuilder;
pub use executor::{BenchmarkOrchestrator, RunHandle};
pub use series::SeriesReport;
pub use state::{Progress, RunState};
