//! Layered CLI settings.
//!
//! Built-in defaults, then an optional settings file, then `STONEBENCH_*`
//! environment variables. Command-line flags are applied on top by the
//! commands themselves.

use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stonebench_core::config::DEFAULT_PROGRESS_EVERY;
use stonebench_core::{OrchestratorConfig, WorkloadKind};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "stonebench";

/// Prefix of environment overrides, e.g. `STONEBENCH_ITERATIONS`.
pub const ENV_PREFIX: &str = "STONEBENCH";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// History file; defaults to the platform data directory.
    pub history_path: Option<PathBuf>,
    /// Iterations per run.
    pub iterations: u64,
    /// Workload to run.
    pub workload: WorkloadKind,
    /// Runs per invocation.
    pub runs: u32,
    /// Sampler tick interval.
    pub sample_interval_ms: u64,
    /// Iterations between cancellation checks.
    pub cancel_check_every: u64,
    /// Run deadline; none by default.
    pub timeout_ms: Option<u64>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_path: None,
            iterations: 50_000,
            workload: WorkloadKind::default(),
            runs: 1,
            sample_interval_ms: 250,
            cancel_check_every: 1_000,
            timeout_ms: None,
            log_level: "warn".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings from `file` (or `stonebench.*` if present) and the
    /// process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(file, None)
    }

    /// Load settings with an explicit environment map instead of the
    /// process environment.
    pub fn load_from(
        file: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        Config::builder()
            .add_source(file_source)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(env))
            .build()?
            .try_deserialize()
    }

    /// History file location.
    pub fn history_path(&self) -> PathBuf {
        self.history_path.clone().unwrap_or_else(default_history_path)
    }

    /// Orchestrator configuration, with an optional interval override.
    pub fn orchestrator_config(
        &self,
        interval_ms: Option<u64>,
    ) -> stonebench_core::Result<OrchestratorConfig> {
        OrchestratorConfig::new(
            Duration::from_millis(interval_ms.unwrap_or(self.sample_interval_ms)),
            self.cancel_check_every,
            DEFAULT_PROGRESS_EVERY,
        )
    }
}

/// `<data dir>/stonebench/history.jsonl`, or a file in the working
/// directory when the platform has no data directory.
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("stonebench").join("history.jsonl"))
        .unwrap_or_else(|| PathBuf::from("stonebench-history.jsonl"))
}
