//! Error ledger
//!
//! The ledger holds the items that failed or were skipped in the most recent
//! pass. It is buffered in memory while a pass runs and written once at the
//! end of the pass, replacing the previous file entirely.

use crate::storage::snapshot::write_csv_atomic;
use crate::storage::traits::{StorageError, StorageResult};
use crate::storage::ItemId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Header of the ledger file
pub const LEDGER_FIELDS: &[&str] = &["id", "url", "reason"];

/// One failed or skipped item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: ItemId,
    pub url: String,
    pub reason: String,
}

/// Entries collected during one pass
#[derive(Debug, Clone, Default)]
pub struct ErrorLedger {
    entries: Vec<LedgerEntry>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: ItemId, url: impl Into<String>, reason: impl Into<String>) {
        self.entries.push(LedgerEntry {
            id,
            url: url.into(),
            reason: reason.into(),
        });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the ledger file at `path` with exactly these entries
    pub fn write(&self, path: &Path) -> StorageResult<()> {
        write_csv_atomic(path, LEDGER_FIELDS, &self.entries)
    }

    /// Reads the ledger file at `path`, in stored order
    ///
    /// A missing file reads as an empty ledger.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.iter().ne(LEDGER_FIELDS.iter().copied()) {
            return Err(StorageError::Malformed {
                path: path.display().to_string(),
                message: format!("expected header {}", LEDGER_FIELDS.join(",")),
            });
        }

        let entries = reader
            .deserialize::<LedgerEntry>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}

impl FromIterator<LedgerEntry> for ErrorLedger {
    fn from_iter<T: IntoIterator<Item = LedgerEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ErrorLedger {
    type Item = LedgerEntry;
    type IntoIter = std::vec::IntoIter<LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
