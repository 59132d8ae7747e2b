// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! On-disk record format.
//!
//! History is a JSON Lines file. Every line is one record tagged with a
//! `kind` and a `schema_version`:
//!
//! ```text
//! {"kind":"entry","schema_version":1,"seq":0,"appended_at":"…","result":{…}}
//! {"kind":"retraction","schema_version":1,"seq":1,"appended_at":"…","id":"…"}
//! ```
//!
//! The version is checked before the rest of the line is decoded, so a
//! record from an incompatible future format is reported as such instead of
//! as a decoding failure. Fields unknown to this build are ignored and
//! fields missing from older records take their defaults.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stonebench_core::BenchmarkResult;
use uuid::Uuid;

/// Format version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A persisted benchmark result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Format version the entry was written with.
    pub schema_version: u32,
    /// Position in the append order.
    pub seq: u64,
    /// When the entry was appended.
    pub appended_at: DateTime<Utc>,
    /// The stored result.
    pub result: BenchmarkResult,
}

impl HistoryEntry {
    /// Id of the stored result.
    pub fn id(&self) -> Uuid {
        self.result.id
    }
}

/// Logical removal of an earlier entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Retraction {
    pub schema_version: u32,
    pub seq: u64,
    pub appended_at: DateTime<Utc>,
    pub id: Uuid,
}

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Record {
    Entry(HistoryEntry),
    Retraction(Retraction),
}

impl Record {
    pub fn seq(&self) -> u64 {
        match self {
            Record::Entry(entry) => entry.seq,
            Record::Retraction(retraction) => retraction.seq,
        }
    }

    /// Encode as a single newline-terminated line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode line `line_no` (1-based) of the history file.
    pub fn parse(line: &str, line_no: usize) -> Result<Record> {
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
            line: line_no,
            reason: e.to_string(),
        })?;

        let version = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| StoreError::Corrupt {
                line: line_no,
                reason: "missing schema_version".to_string(),
            })?;
        if version != u64::from(CURRENT_SCHEMA_VERSION) {
            return Err(StoreError::Schema {
                line: line_no,
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
            line: line_no,
            reason: e.to_string(),
        })
    }
}
