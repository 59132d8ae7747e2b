//! Human-readable rendering of scores, sizes and metric values.

use stonebench_core::Metric;
use uuid::Uuid;

/// First block of a run id, enough to tell runs apart in a listing.
pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Bytes with a binary unit suffix, e.g. `1.50 GiB`.
pub fn human_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Iterations per second with thousands grouping, e.g. `125,000.0`.
pub fn ops(ops_per_second: f64) -> String {
    let rounded = format!("{:.1}", ops_per_second.abs());
    let (whole, frac) = rounded.split_once('.').unwrap_or((&rounded, "0"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if ops_per_second < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// A sampled value in the unit of its metric.
pub fn metric_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::CpuPercent => format!("{value:.1}%"),
        Metric::MemoryUsedBytes => human_bytes(value),
        Metric::DiskIoBytesPerSec | Metric::NetworkIoBytesPerSec => format!("{}/s", human_bytes(value)),
        Metric::CpuTemperatureCelsius => format!("{value:.1} °C"),
    }
}

/// A signed percentage, or `n/a` when undefined.
pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(p) => format!("{p:+.2}%"),
        None => "n/a".to_string(),
    }
}
