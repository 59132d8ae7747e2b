// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host telemetry sources.
//!
//! The sampler talks to the host only through [`TelemetrySource`]; each
//! metric is read independently so that one unavailable counter never hides
//! the others. [`SysinfoTelemetry`] is the built-in implementation.
//!
//! [`SystemInfoProvider`] supplies the opaque host description that is
//! attached to every result.

use crate::error::SamplingError;
use crate::types::SystemInfo;
use serde_json::json;
use std::sync::Arc;
use sysinfo::{Components, Disks, Networks, System};

/// Per-metric access to host counters.
///
/// Disk and network values are cumulative byte counters; the sampler turns
/// them into rates by differencing consecutive readings.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySource: Send {
    /// Global CPU load in percent (0-100).
    fn cpu_percent(&mut self) -> Result<f64, SamplingError>;

    /// Physical memory currently in use, bytes.
    fn memory_used_bytes(&mut self) -> Result<f64, SamplingError>;

    /// Total bytes read from and written to disk since an arbitrary origin.
    fn disk_io_total_bytes(&mut self) -> Result<u64, SamplingError>;

    /// Total bytes received and transmitted on all interfaces since an
    /// arbitrary origin.
    fn network_io_total_bytes(&mut self) -> Result<u64, SamplingError>;

    /// Hottest CPU temperature sensor, degrees Celsius.
    fn cpu_temperature_celsius(&mut self) -> Result<f64, SamplingError> {
        Err(SamplingError::Unavailable("cpu_temperature_celsius"))
    }
}

/// Creates a fresh telemetry source for each run.
pub type TelemetryFactory = Arc<dyn Fn() -> Box<dyn TelemetrySource> + Send + Sync>;

/// Factory producing [`SysinfoTelemetry`] sources.
pub fn sysinfo_factory() -> TelemetryFactory {
    Arc::new(|| Box::new(SysinfoTelemetry::new()) as Box<dyn TelemetrySource>)
}

/// A telemetry source backed by the `sysinfo` crate.
pub struct SysinfoTelemetry {
    system: System,
    disks: Disks,
    networks: Networks,
    components: Components,
}

impl SysinfoTelemetry {
    /// Creates a new source and primes the CPU counters so that the first
    /// reading already spans a real interval.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
        }
    }

    fn ensure_supported(metric: &'static str) -> Result<(), SamplingError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(SamplingError::Unavailable(metric))
        }
    }
}

impl Default for SysinfoTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for SysinfoTelemetry {
    fn cpu_percent(&mut self) -> Result<f64, SamplingError> {
        Self::ensure_supported("cpu_percent")?;
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            return Err(SamplingError::Unavailable("cpu_percent"));
        }
        let load = f64::from(self.system.global_cpu_usage());
        if load.is_finite() {
            Ok(load.clamp(0.0, 100.0))
        } else {
            Err(SamplingError::Read {
                metric: "cpu_percent",
                reason: format!("non-finite load {load}"),
            })
        }
    }

    fn memory_used_bytes(&mut self) -> Result<f64, SamplingError> {
        Self::ensure_supported("memory_used_bytes")?;
        self.system.refresh_memory();
        if self.system.total_memory() == 0 {
            return Err(SamplingError::Unavailable("memory_used_bytes"));
        }
        Ok(self.system.used_memory() as f64)
    }

    fn disk_io_total_bytes(&mut self) -> Result<u64, SamplingError> {
        Self::ensure_supported("disk_io_bytes")?;
        self.disks.refresh(true);
        if self.disks.list().is_empty() {
            return Err(SamplingError::Unavailable("disk_io_bytes"));
        }
        Ok(self
            .disks
            .list()
            .iter()
            .map(|disk| {
                let usage = disk.usage();
                usage.total_read_bytes.saturating_add(usage.total_written_bytes)
            })
            .fold(0u64, u64::saturating_add))
    }

    fn network_io_total_bytes(&mut self) -> Result<u64, SamplingError> {
        Self::ensure_supported("network_io_bytes")?;
        self.networks.refresh(true);
        if self.networks.list().is_empty() {
            return Err(SamplingError::Unavailable("network_io_bytes"));
        }
        Ok(self
            .networks
            .list()
            .values()
            .map(|data| data.total_received().saturating_add(data.total_transmitted()))
            .fold(0u64, u64::saturating_add))
    }

    fn cpu_temperature_celsius(&mut self) -> Result<f64, SamplingError> {
        Self::ensure_supported("cpu_temperature_celsius")?;
        self.components.refresh(true);
        hottest_cpu_sensor(
            self.components
                .list()
                .iter()
                .map(|component| (component.label(), component.temperature())),
        )
        .ok_or(SamplingError::Unavailable("cpu_temperature_celsius"))
    }
}

/// Sensor labels that belong to the CPU package or its cores.
const CPU_SENSOR_LABELS: [&str; 5] = ["cpu", "core", "package", "tctl", "k10temp"];

/// Highest plausible reading among CPU sensors, from `(label, celsius)` pairs.
fn hottest_cpu_sensor<'a>(sensors: impl Iterator<Item = (&'a str, Option<f32>)>) -> Option<f64> {
    sensors
        .filter(|(label, _)| {
            let label = label.to_ascii_lowercase();
            CPU_SENSOR_LABELS.iter().any(|known| label.contains(known))
        })
        .filter_map(|(_, celsius)| celsius)
        .map(f64::from)
        .filter(|celsius| celsius.is_finite() && *celsius > 0.0)
        .max_by(f64::total_cmp)
}

/// Supplies the host description attached to each result.
pub trait SystemInfoProvider: Send + Sync {
    /// Take a snapshot of the host. Must not fail; unknown fields are omitted.
    fn snapshot(&self) -> SystemInfo;
}

/// Collects OS, CPU and memory details through `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoSystemInfo;

impl SystemInfoProvider for SysinfoSystemInfo {
    fn snapshot(&self) -> SystemInfo {
        let mut info = SystemInfo::new();
        info.insert("stonebench_version".into(), json!(env!("CARGO_PKG_VERSION")));
        info.insert("arch".into(), json!(std::env::consts::ARCH));

        let optional = [
            ("os_name", System::name()),
            ("os_version", System::long_os_version()),
            ("kernel_version", System::kernel_version()),
            ("hostname", System::host_name()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                info.insert(key.into(), json!(value));
            }
        }

        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return info;
        }

        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();

        let cpus = system.cpus();
        if let Some(cpu) = cpus.first() {
            info.insert("cpu_brand".into(), json!(cpu.brand().trim()));
            info.insert("cpu_frequency_mhz".into(), json!(cpu.frequency()));
        }
        if !cpus.is_empty() {
            info.insert("logical_cores".into(), json!(cpus.len()));
        }
        if system.total_memory() > 0 {
            info.insert("memory_total_bytes".into(), json!(system.total_memory()));
            info.insert("memory_used_bytes".into(), json!(system.used_memory()));
            info.insert("swap_total_bytes".into(), json!(system.total_swap()));
        }

        info
    }
}

/// A fixed snapshot, for hosts that collect system details themselves.
#[derive(Debug, Default, Clone)]
pub struct StaticSystemInfo(pub SystemInfo);

impl SystemInfoProvider for StaticSystemInfo {
    fn snapshot(&self) -> SystemInfo {
        self.0.clone()
    }
}
