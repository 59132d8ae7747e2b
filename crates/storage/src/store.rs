// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! The append-only history file.

use crate::compare::Comparison;
use crate::error::{Result, StoreError};
use crate::query::{HistoryFilter, HistoryQuery};
use crate::record::{HistoryEntry, Record, Retraction, CURRENT_SCHEMA_VERSION};
use chrono::Utc;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use stonebench_core::{BenchmarkResult, ResultSink, SinkError};
use uuid::Uuid;

/// Durable, append-only history of benchmark results.
///
/// Appends are serialized by a single write lock and each record is synced
/// before it becomes visible to readers. Readers work on snapshots and never
/// block appends for longer than it takes to clone the index.
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    /// Next sequence number; holding this lock is the right to write.
    writer: Mutex<u64>,
    index: RwLock<Index>,
}

#[derive(Debug, Default)]
struct Index {
    entries: Vec<Arc<HistoryEntry>>,
    retracted: HashSet<Uuid>,
}

impl Index {
    fn live(&self) -> Vec<Arc<HistoryEntry>> {
        self.entries
            .iter()
            .filter(|entry| !self.retracted.contains(&entry.id()))
            .cloned()
            .collect()
    }

    fn find(&self, id: Uuid) -> Option<&Arc<HistoryEntry>> {
        if self.retracted.contains(&id) {
            return None;
        }
        self.entries.iter().find(|entry| entry.id() == id)
    }

    fn apply(&mut self, record: Record) {
        match record {
            Record::Entry(entry) => self.entries.push(Arc::new(entry)),
            Record::Retraction(retraction) => {
                self.retracted.insert(retraction.id);
            }
        }
    }
}

impl ResultStore {
    /// Open the history at `path`, creating the file and its directory if
    /// they do not exist, and load every record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let (index, next_seq) = if path.exists() {
            load(&path)?
        } else {
            File::create(&path).map_err(|e| StoreError::io(&path, e))?;
            (Index::default(), 0)
        };

        tracing::info!(
            path = %path.display(),
            entries = index.entries.len(),
            retracted = index.retracted.len(),
            "Opened history"
        );

        Ok(Self {
            path,
            writer: Mutex::new(next_seq),
            index: RwLock::new(index),
        })
    }

    /// Location of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live (not retracted) entries.
    pub fn len(&self) -> usize {
        let index = self.read_index();
        index
            .entries
            .iter()
            .filter(|entry| !index.retracted.contains(&entry.id()))
            .count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `result` and return the stored entry.
    ///
    /// Fails with `Io` when the file cannot be written; nothing is recorded
    /// in that case. Fails with `Duplicate` when the id is already present.
    pub fn append(&self, result: &BenchmarkResult) -> Result<HistoryEntry> {
        let mut next_seq = self.lock_writer();
        if self.read_index().entries.iter().any(|e| e.id() == result.id) {
            return Err(StoreError::Duplicate(result.id));
        }

        let entry = HistoryEntry {
            schema_version: CURRENT_SCHEMA_VERSION,
            seq: *next_seq,
            appended_at: Utc::now(),
            result: result.clone(),
        };
        self.write_record(&Record::Entry(entry.clone()))?;
        *next_seq += 1;

        self.write_index().entries.push(Arc::new(entry.clone()));
        tracing::debug!(
            run_id = %entry.id(),
            seq = entry.seq,
            status = %entry.result.status,
            "Appended history entry"
        );
        Ok(entry)
    }

    /// Entries matching `filter`, newest first.
    pub fn query(&self, filter: HistoryFilter) -> HistoryQuery {
        HistoryQuery::new(self.read_index().live(), filter)
    }

    /// Every live entry, newest first.
    pub fn all(&self) -> HistoryQuery {
        self.query(HistoryFilter::new())
    }

    /// The live entry for `id`.
    pub fn get(&self, id: Uuid) -> Result<HistoryEntry> {
        self.read_index()
            .find(id)
            .map(|entry| entry.as_ref().clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// Compare entry `id_b` against entry `id_a`.
    pub fn compare(&self, id_a: Uuid, id_b: Uuid) -> Result<Comparison> {
        let a = self.get(id_a)?;
        let b = self.get(id_b)?;
        Ok(Comparison::between(a, b))
    }

    /// Logically remove the entry for `id` by appending a retraction.
    ///
    /// The entry stays in the file until [`ResultStore::compact`] runs.
    pub fn retract(&self, id: Uuid) -> Result<()> {
        let mut next_seq = self.lock_writer();
        if self.read_index().find(id).is_none() {
            return Err(StoreError::NotFound(id));
        }

        let record = Record::Retraction(Retraction {
            schema_version: CURRENT_SCHEMA_VERSION,
            seq: *next_seq,
            appended_at: Utc::now(),
            id,
        });
        self.write_record(&record)?;
        *next_seq += 1;

        self.write_index().retracted.insert(id);
        tracing::info!(run_id = %id, "Retracted history entry");
        Ok(())
    }

    /// Rewrite the file without retracted entries or retraction records.
    ///
    /// The new file is written beside the old one and renamed over it, so a
    /// crash leaves either the old or the new history intact. Returns the
    /// number of entries dropped.
    pub fn compact(&self) -> Result<usize> {
        let _writer = self.lock_writer();
        let (live, removed) = {
            let index = self.read_index();
            let live = index.live();
            let removed = index.entries.len() - live.len();
            (live, removed)
        };

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".compact");
        let tmp_path = PathBuf::from(tmp_name);

        let mut contents = String::new();
        for entry in &live {
            contents.push_str(&Record::Entry(entry.as_ref().clone()).to_line()?);
        }
        {
            let mut file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
            file.write_all(contents.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| StoreError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        let mut index = self.write_index();
        index.entries = live;
        index.retracted.clear();
        tracing::info!(removed, kept = index.entries.len(), "Compacted history");
        Ok(removed)
    }

    /// Append one record line.
    ///
    /// A torn tail left by an earlier crash is repaired first. If the write
    /// itself fails, the file is cut back to its previous length so the
    /// next append never lands on a partial line.
    fn write_record(&self, record: &Record) -> Result<()> {
        let line = record.to_line()?;
        let io_error = |e: io::Error| StoreError::io(&self.path, e);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        let len = repair_tail(&mut file).map_err(io_error)?;
        append_or_rollback(&mut file, len, |file| {
            file.write_all(line.as_bytes())?;
            file.flush()?;
            file.sync_data()
        })
        .map_err(io_error)
    }

    fn lock_writer(&self) -> MutexGuard<'_, u64> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_index(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for ResultStore {
    fn append(&self, result: &BenchmarkResult) -> std::result::Result<(), SinkError> {
        ResultStore::append(self, result)
            .map(|_| ())
            .map_err(|e| Box::new(e) as SinkError)
    }
}

/// Read every record of the file at `path`.
///
/// An undecodable final line without a trailing newline is the remains of
/// an interrupted append: it is skipped here and removed by the next write.
/// Anywhere else an undecodable line fails the load.
fn load(path: &Path) -> Result<(Index, u64)> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut index = Index::default();
    let mut next_seq = 0;
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| StoreError::io(path, e))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let terminated = buf.last() == Some(&b'\n');

        let parsed = match std::str::from_utf8(&buf) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => Record::parse(text.trim_end_matches(|c| c == '\n' || c == '\r'), line_no),
            Err(e) => Err(StoreError::Corrupt {
                line: line_no,
                reason: e.to_string(),
            }),
        };

        match parsed {
            Ok(record) => {
                next_seq = next_seq.max(record.seq() + 1);
                index.apply(record);
            }
            Err(StoreError::Corrupt { line, reason }) if !terminated => {
                tracing::warn!(
                    path = %path.display(),
                    line,
                    %reason,
                    "Ignoring torn record at the end of history"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok((index, next_seq))
}

/// Make sure the file ends on a line boundary and return its length.
///
/// A complete record that only lacks its newline is kept and terminated;
/// anything else after the last newline is truncated.
fn repair_tail(file: &mut File) -> io::Result<u64> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    let start = last_line_start(file, len)?;
    let mut fragment = Vec::new();
    file.seek(SeekFrom::Start(start))?;
    Read::take(&mut *file, len - start).read_to_end(&mut fragment)?;

    let complete = std::str::from_utf8(&fragment)
        .ok()
        .is_some_and(|text| Record::parse(text.trim_end(), 0).is_ok());
    if complete {
        file.write_all(b"\n")?;
        return Ok(len + 1);
    }

    tracing::warn!(bytes = len - start, "Truncating torn record at the end of history");
    file.set_len(start)?;
    Ok(start)
}

/// Offset just past the last newline before `len`, or 0 if there is none.
fn last_line_start(file: &mut File, len: u64) -> io::Result<u64> {
    let mut buf = [0u8; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Run `write`, restoring the file to `len` bytes if it fails.
fn append_or_rollback<F>(file: &mut File, len: u64, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let Err(e) = write(&mut *file) else {
        return Ok(());
    };
    if let Err(rollback) = file.set_len(len).and_then(|_| file.sync_data()) {
        tracing::error!(error = %rollback, "Failed to roll back a partial history write");
    }
    Err(e)
}
