//! Append-only JSONL journal of successful records
//!
//! Unlike the CSV snapshot the journal is never truncated or rewritten. Each
//! success appends one line, so the file doubles as an audit trail across
//! passes and runs.

use crate::storage::traits::StorageResult;
use crate::storage::Record;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct Journal {
    out: BufWriter<File>,
}

impl Journal {
    /// Opens `path` for appending, creating it and its parent directory if needed
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Appends one record as a single JSON line and flushes it
    pub fn append(&mut self, record: &Record) -> StorageResult<()> {
        let line = serde_json::to_string(record)?;
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
