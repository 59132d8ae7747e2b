// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark core for Stonebench.
//!
//! Runs a timed CPU workload while sampling host telemetry on a separate
//! task, folds both into a [`BenchmarkResult`], and hands the result to a
//! [`ResultSink`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stonebench_core::{DiscardSink, OrchestratorBuilder, RunConfig};
//!
//! # async fn demo() -> stonebench_core::Result<()> {
//! let orchestrator = OrchestratorBuilder::new()
//!     .sink(Arc::new(DiscardSink))
//!     .build()?;
//!
//! let result = orchestrator.run(RunConfig::new(50_000)).await?;
//! println!("{} ops/s", result.raw_timing.ops_per_second);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`workload`] - Timed workloads and the runner
//! - [`sampler`] - Periodic telemetry capture
//! - [`stats`] - Summary statistics
//! - [`orchestrator`] - Run lifecycle
//! - [`telemetry`] - Host telemetry and system info sources

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod sampler;
pub mod sink;
pub mod stats;
pub mod telemetry;
pub mod types;
pub mod workload;

pub use config::{OrchestratorConfig, RunConfig};
pub use error::{BenchError, Result, SamplingError, SinkError};
pub use orchestrator::{
    BenchmarkOrchestrator, OrchestratorBuilder, Progress, RunHandle, RunState, SeriesReport,
};
pub use sampler::{MetricsSampler, SamplerHandle};
pub use sink::{DiscardSink, ResultSink};
pub use stats::StatsAggregator;
pub use telemetry::{
    sysinfo_factory, StaticSystemInfo, SysinfoSystemInfo, SysinfoTelemetry, SystemInfoProvider,
    TelemetryFactory, TelemetrySource,
};
pub use types::{
    BenchmarkResult, Metric, MetricSample, RawTiming, RunStatus, StatSummary, SummaryStats,
    SystemInfo,
};
pub use workload::{WorkloadKind, WorkloadOutcome, WorkloadRunner};
