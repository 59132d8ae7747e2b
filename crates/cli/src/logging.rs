//! Tracing subscriber setup.

use crate::settings::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; `quiet` lowers the default to warnings.
/// Logs go to stderr so that command output on stdout stays parseable.
pub fn init(level: &str, format: LogFormat, quiet: bool) {
    let default = if quiet { "warn" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("Logging already initialised: {e}");
    }
}
