//! Append-only JSONL record store.
//!
//! Each append writes one self-contained JSON line and flushes, so logs from
//! independent processes interleave without a shared lock and a half-written
//! final line never corrupts prior entries. Readers skip unparsable lines
//! with a warning instead of failing.

use crate::record::Record;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no successful trial recorded for task {task}")]
    NoSuccessfulTrial { task: String },
    #[error("record log I/O error")]
    Io(#[from] std::io::Error),
    #[error("record serialization error")]
    Serde(#[from] serde_json::Error),
}

/// Writer handle for one record log. Reading always goes through the free
/// functions so any process can query a log it did not produce.
pub struct RecordStore {
    path: PathBuf,
    file: File,
}

impl RecordStore {
    /// Open (or create) a log for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record durably. The single write+flush of a full line is
    /// the atomicity unit; storage failures here are fatal to the session.
    pub fn append(&mut self, record: &Record) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Lazily iterate every parsable record in append order. Unparsable lines
/// (e.g. a torn final write) are skipped with a warning.
pub fn read_all(path: impl AsRef<Path>) -> Result<impl Iterator<Item = Record>, StoreError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(reader.lines().enumerate().filter_map(|(lineno, line)| {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(lineno, error = %e, "unreadable log line, skipping");
                return None;
            }
        };
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Record>(&line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(lineno, error = %e, "malformed log line, skipping");
                None
            }
        }
    }))
}

/// All records for one task, in append order. Records for other tasks in a
/// shared log are skipped, not errors. A missing log is an empty history.
pub fn load_task(path: impl AsRef<Path>, task_key: &str) -> Result<Vec<Record>, StoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(read_all(path)?
        .filter(|r| r.task_key() == task_key)
        .collect())
}

/// The best successful record for a task across all prior runs: lowest mean
/// latency, ties broken by earliest timestamp. Mismatched or failed trials
/// never qualify.
pub fn best(path: impl AsRef<Path>, task_key: &str) -> Result<Record, StoreError> {
    let mut best: Option<Record> = None;
    for record in load_task(path, task_key)? {
        if !record.result.is_eligible_best() {
            continue;
        }
        match &best {
            Some(current) if !record.better_than(current) => {}
            _ => best = Some(record),
        }
    }
    best.ok_or_else(|| StoreError::NoSuccessfulTrial {
        task: task_key.to_string(),
    })
}
