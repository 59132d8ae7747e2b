// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark history for Stonebench.
//!
//! [`ResultStore`] keeps every finished run in an append-only JSON Lines
//! file. Entries are never rewritten in place: removal appends a
//! retraction, and only an explicit [`ResultStore::compact`] rewrites the
//! file.
//!
//! # Quick Start
//!
//! ```no_run
//! use stonebench_storage::{HistoryFilter, ResultStore};
//! use stonebench_core::RunStatus;
//!
//! let store = ResultStore::open("history.jsonl")?;
//! for entry in store.query(HistoryFilter::new().status(RunStatus::Completed).limit(10)) {
//!     println!("{} {}", entry.result.id, entry.result.raw_timing.ops_per_second);
//! }
//! # Ok::<(), stonebench_storage::StoreError>(())
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod compare;
pub mod error;
pub mod query;
pub mod record;
pub mod store;

pub use compare::{Comparison, Delta};
pub use error::{Result, StoreError};
pub use query::{HistoryFilter, HistoryQuery};
pub use record::{HistoryEntry, CURRENT_SCHEMA_VERSION};
pub use store::ResultStore;
