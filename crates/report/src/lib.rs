//! Reporting for Stonebench results.
//!
//! Turns results, history listings and comparisons into files and text.
//!
//! # Quick Start
//!
//! ```no_run
//! use stonebench_report::{io, markdown};
//! # fn demo(result: &stonebench_core::BenchmarkResult) -> std::io::Result<()> {
//! io::export_result(result, "out/run.json")?;
//! println!("{}", markdown::render_result(result));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`io`] - Reading and writing results as JSON or CSV
//! - [`markdown`] - Markdown report generation, including run series
//! - [`format`] - Human-readable numbers

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod format;
pub mod io;
pub mod markdown;
