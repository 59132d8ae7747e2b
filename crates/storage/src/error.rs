// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the history store.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// History store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the history file failed.
    #[error("History I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A record could not be encoded.
    #[error("Failed to encode history record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No live entry carries this id.
    #[error("No history entry with id {0}")]
    NotFound(Uuid),

    /// An entry with this id is already in history.
    #[error("History already contains an entry with id {0}")]
    Duplicate(Uuid),

    /// A record was written by an incompatible format version.
    #[error("Unsupported history schema version {found} on line {line} (this build reads version {supported})")]
    Schema {
        /// 1-based line number.
        line: usize,
        /// Version found on the line.
        found: u64,
        /// Version this build reads and writes.
        supported: u32,
    },

    /// A line could not be decoded.
    #[error("Corrupt history record on line {line}: {reason}")]
    Corrupt {
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
