// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Side-by-side comparison of two history entries.

use crate::record::HistoryEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use stonebench_core::BenchmarkResult;

/// Change of one statistic from entry A to entry B.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delta {
    /// Value in entry A.
    pub a: Option<f64>,
    /// Value in entry B.
    pub b: Option<f64>,
    /// `b - a`; absent unless both values are present.
    pub absolute: Option<f64>,
    /// `(b - a) / a * 100`; absent when `a` is zero or either value is absent.
    pub percent: Option<f64>,
}

impl Delta {
    fn between(a: Option<f64>, b: Option<f64>) -> Self {
        let (absolute, percent) = match (a, b) {
            (Some(a), Some(b)) => {
                let absolute = b - a;
                let percent = (a != 0.0).then(|| absolute / a * 100.0);
                (Some(absolute), percent)
            }
            _ => (None, None),
        };
        Self {
            a,
            b,
            absolute,
            percent,
        }
    }
}

/// Per-statistic deltas between two entries. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Baseline entry.
    pub entry_a: HistoryEntry,
    /// Entry compared against the baseline.
    pub entry_b: HistoryEntry,
    /// Keyed by `score.ops_per_second`, `timing.elapsed_nanos`,
    /// `timing.iterations` and `<metric>.<statistic>`.
    pub deltas: BTreeMap<String, Delta>,
}

impl Comparison {
    /// Compare `entry_b` against `entry_a`.
    pub fn between(entry_a: HistoryEntry, entry_b: HistoryEntry) -> Self {
        let a = statistics(&entry_a.result);
        let b = statistics(&entry_b.result);

        let keys: std::collections::BTreeSet<&String> = a.keys().chain(b.keys()).collect();
        let deltas = keys
            .into_iter()
            .map(|key| {
                let delta = Delta::between(a.get(key).copied(), b.get(key).copied());
                (key.clone(), delta)
            })
            .collect();

        Self {
            entry_a,
            entry_b,
            deltas,
        }
    }

    /// Delta of the primary score.
    pub fn score(&self) -> Option<&Delta> {
        self.deltas.get("score.ops_per_second")
    }
}

/// Flatten the comparable numbers of a result into named statistics.
fn statistics(result: &BenchmarkResult) -> BTreeMap<String, f64> {
    let mut stats = BTreeMap::new();
    stats.insert("score.ops_per_second".to_string(), result.summary_stats.ops_per_second);
    stats.insert("timing.elapsed_nanos".to_string(), result.raw_timing.elapsed_nanos as f64);
    stats.insert("timing.iterations".to_string(), result.raw_timing.iterations as f64);

    for (metric, summary) in &result.summary_stats.metrics {
        for (name, value) in summary.fields() {
            stats.insert(format!("{metric}.{name}"), value);
        }
    }
    stats
}
