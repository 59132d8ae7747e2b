// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Builder pattern for orchestrator construction

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::error::{BenchError, Result};
use crate::sink::ResultSink;
use crate::telemetry::{sysinfo_factory, SysinfoSystemInfo, SystemInfoProvider, TelemetryFactory};

use super::executor::BenchmarkOrchestrator;

/// Builder for a [`BenchmarkOrchestrator`].
///
/// Telemetry defaults to the `sysinfo` source and the host description to
/// [`SysinfoSystemInfo`]. A result sink is required.
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .config(OrchestratorConfig::default())
///     .sink(Arc::new(store))
///     .build()?;
///
/// let result = orchestrator.run(RunConfig::new(50_000)).await?;
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    sink: Option<Arc<dyn ResultSink>>,
    telemetry: Option<TelemetryFactory>,
    system_info: Option<Arc<dyn SystemInfoProvider>>,
}

impl OrchestratorBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the orchestrator configuration.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set where finished results are written (required).
    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the telemetry source factory.
    pub fn telemetry(mut self, telemetry: TelemetryFactory) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the host description provider.
    pub fn system_info(mut self, provider: Arc<dyn SystemInfoProvider>) -> Self {
        self.system_info = Some(provider);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<BenchmarkOrchestrator> {
        let sink = self
            .sink
            .ok_or_else(|| BenchError::invalid_argument("a result sink is required"))?;
        let telemetry = self.telemetry.unwrap_or_else(sysinfo_factory);
        let system_info = self
            .system_info
            .unwrap_or_else(|| Arc::new(SysinfoSystemInfo) as Arc<dyn SystemInfoProvider>);

        BenchmarkOrchestrator::new(self.config, sink, telemetry, system_info)
    }
}
