// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! History filters and the query iterator.

use crate::record::HistoryEntry;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use stonebench_core::{RunStatus, WorkloadKind};

/// Which entries a query returns. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    /// Earliest `finished_at`, inclusive.
    pub since: Option<DateTime<Utc>>,
    /// Latest `finished_at`, inclusive.
    pub until: Option<DateTime<Utc>>,
    /// Accepted statuses; empty accepts all.
    pub statuses: BTreeSet<RunStatus>,
    /// Only entries for this workload.
    pub workload: Option<WorkloadKind>,
    /// Stop after this many entries.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// A filter matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only entries that finished at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Only entries that finished at or before `until`.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Also accept `status`.
    pub fn status(mut self, status: RunStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    /// Only entries for `workload`.
    pub fn workload(mut self, workload: WorkloadKind) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Return at most `limit` entries.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `entry` passes every criterion except the limit.
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        let result = &entry.result;
        if self.since.is_some_and(|since| result.finished_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| result.finished_at > until) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&result.status) {
            return false;
        }
        if self.workload.is_some_and(|workload| result.workload != workload) {
            return false;
        }
        true
    }
}

/// Entries matching a filter, newest `finished_at` first.
///
/// The iterator walks a snapshot taken when the query was issued; entries
/// appended afterwards are not seen. Issue the query again for a fresh view.
#[derive(Debug)]
pub struct HistoryQuery {
    entries: std::vec::IntoIter<Arc<HistoryEntry>>,
    filter: HistoryFilter,
    remaining: Option<usize>,
}

impl HistoryQuery {
    pub(crate) fn new(mut snapshot: Vec<Arc<HistoryEntry>>, filter: HistoryFilter) -> Self {
        snapshot.sort_by(|a, b| {
            b.result
                .finished_at
                .cmp(&a.result.finished_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        let remaining = filter.limit;
        Self {
            entries: snapshot.into_iter(),
            filter,
            remaining,
        }
    }
}

impl Iterator for HistoryQuery {
    type Item = Arc<HistoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let filter = &self.filter;
        let next = self.entries.by_ref().find(|entry| filter.matches(entry))?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(next)
    }
}
