//! Keyed merge store and atomic CSV snapshots
//!
//! The merge store holds the latest complete record per item. Every upsert
//! rewrites the whole snapshot through a temporary file followed by a rename,
//! so readers only ever observe the previous or the next complete snapshot.

use crate::storage::journal::Journal;
use crate::storage::traits::{StorageError, StorageResult};
use crate::storage::{ItemId, Record, CSV_FIELDS};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &str = "\u{feff}";

/// In-memory map from item identity to its most recent record
///
/// Seeded from the prior run's snapshot. Iteration order is by identity so
/// that an unchanged dataset always serializes to the same bytes.
pub struct MergeStore {
    records: BTreeMap<ItemId, Record>,
    snapshot_path: PathBuf,
    journal: Journal,
}

impl MergeStore {
    /// Opens the store, loading any prior snapshot and the journal for appending
    ///
    /// A missing or malformed prior snapshot is not an error; the store starts
    /// empty and the cause is logged.
    pub fn open(snapshot_path: &Path, journal_path: &Path) -> StorageResult<Self> {
        let records = load_prior_snapshot(snapshot_path);
        let journal = Journal::open(journal_path)?;

        Ok(Self {
            records,
            snapshot_path: snapshot_path.to_path_buf(),
            journal,
        })
    }

    /// Inserts or replaces the record for `id`, then persists
    ///
    /// The snapshot is rewritten atomically and the record is appended to the
    /// journal before this returns.
    pub fn upsert(&mut self, id: ItemId, mut record: Record) -> StorageResult<()> {
        record.id = Some(id);
        self.journal.append(&record)?;
        self.records.insert(id, record);
        self.persist()
    }

    /// Rewrites the snapshot from the in-memory map
    pub fn persist(&self) -> StorageResult<()> {
        write_csv_atomic(&self.snapshot_path, CSV_FIELDS, self.records.values())
    }

    pub fn get(&self, id: ItemId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Loads the prior snapshot, falling back to an empty map
///
/// Existing rows are trusted as-is; rows without an identity are dropped.
pub fn load_prior_snapshot(path: &Path) -> BTreeMap<ItemId, Record> {
    match read_snapshot(path) {
        Ok(records) => {
            tracing::info!(
                "Loaded {} records from prior snapshot {}",
                records.len(),
                path.display()
            );
            records
        }
        Err(e) if e.is_not_found() => {
            tracing::info!("No prior snapshot at {}, starting empty", path.display());
            BTreeMap::new()
        }
        Err(e) => {
            tracing::warn!(
                "Prior snapshot {} is unreadable, starting empty: {}",
                path.display(),
                e
            );
            BTreeMap::new()
        }
    }
}

/// Reads a snapshot written by [`MergeStore::persist`]
///
/// Only a missing file or a missing id column fails the read. Rows that
/// cannot be decoded or carry no id are skipped with a warning, so one bad
/// row never discards the rest of the dataset.
pub fn read_snapshot(path: &Path) -> StorageResult<BTreeMap<ItemId, Record>> {
    let text = fs::read_to_string(path)?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == CSV_FIELDS[0]) {
        return Err(StorageError::Malformed {
            path: path.display().to_string(),
            message: format!("missing {} column", CSV_FIELDS[0]),
        });
    }

    let mut records = BTreeMap::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<Record>() {
        match row {
            Ok(record) => match record.id {
                Some(id) => {
                    records.insert(id, record);
                }
                None => skipped += 1,
            },
            Err(e) => {
                tracing::warn!("Skipping unreadable row in {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "Skipped {} rows of {} without a usable id",
            skipped,
            path.display()
        );
    }

    Ok(records)
}

/// Writes rows to `path` through a sibling temporary file and a rename
///
/// The header is always written, so an empty row set yields a header-only
/// file. A UTF-8 BOM leads the file for spreadsheet compatibility.
pub fn write_csv_atomic<'a, T, I>(path: &Path, header: &[&str], rows: I) -> StorageResult<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    let mut file = File::create(&tmp_path)?;
    file.write_all(UTF8_BOM.as_bytes())?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut file);
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }

    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
