//! History browsing and maintenance.

use crate::settings::Settings;
use crate::{display, HistoryArgs, Outcome};
use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use stonebench_core::WorkloadKind;
use stonebench_report::markdown;
use stonebench_storage::{HistoryEntry, HistoryFilter, ResultStore};
use uuid::Uuid;

fn open(settings: &Settings) -> anyhow::Result<ResultStore> {
    let path = settings.history_path();
    ResultStore::open(&path)
        .with_context(|| format!("Failed to open history at {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build the store filter from command-line filters.
pub fn filter(args: &HistoryArgs) -> HistoryFilter {
    let mut filter = HistoryFilter::new();
    filter.since = args.since;
    filter.until = args.until;
    filter.workload = args.workload;
    filter.limit = args.limit;
    args.status
        .iter()
        .fold(filter, |filter, status| filter.status(*status))
}

/// `history`
pub fn list(settings: &Settings, args: HistoryArgs) -> anyhow::Result<Outcome> {
    let store = open(settings)?;
    let entries: Vec<HistoryEntry> = store
        .query(filter(&args))
        .map(|entry| entry.as_ref().clone())
        .collect();

    if args.json {
        print_json(&entries)?;
    } else if args.markdown {
        print!("{}", markdown::render_history(&entries));
    } else {
        display::print_history(&entries);
    }
    Ok(Outcome::Success)
}

/// `show <id>`
pub fn show(settings: &Settings, id: Uuid, as_markdown: bool, json: bool) -> anyhow::Result<Outcome> {
    let entry = open(settings)?.get(id)?;
    if json {
        print_json(&entry.result)?;
    } else if as_markdown {
        print!("{}", markdown::render_result(&entry.result));
    } else {
        display::print_result(&entry.result);
    }
    Ok(Outcome::Success)
}

/// `compare <a> <b>`
pub fn compare(
    settings: &Settings,
    a: Uuid,
    b: Uuid,
    as_markdown: bool,
    json: bool,
) -> anyhow::Result<Outcome> {
    let comparison = open(settings)?.compare(a, b)?;
    if json {
        print_json(&comparison)?;
    } else if as_markdown {
        print!("{}", markdown::render_comparison(&comparison));
    } else {
        display::print_comparison(&comparison);
    }
    Ok(Outcome::Success)
}

/// `forget <id>`
pub fn forget(settings: &Settings, id: Uuid) -> anyhow::Result<Outcome> {
    open(settings)?.retract(id)?;
    println!("{} {}", "Forgot".green(), id);
    Ok(Outcome::Success)
}

/// `compact`
pub fn compact(settings: &Settings) -> anyhow::Result<Outcome> {
    let store = open(settings)?;
    let removed = store.compact()?;
    println!(
        "{} {} removed, {} kept in {}",
        "Compacted:".green(),
        removed,
        store.len(),
        store.path().display()
    );
    Ok(Outcome::Success)
}

/// `workloads`
pub fn workloads() {
    for kind in WorkloadKind::ALL {
        let marker = if kind == WorkloadKind::default() {
            " (default)"
        } else {
            ""
        };
        println!("{:<14} {}{}", kind.as_str().bold(), kind.description(), marker.dimmed());
    }
}
