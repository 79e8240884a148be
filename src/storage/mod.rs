//! Storage module for persisting harvest data
//!
//! This module handles all durable output of a harvest, including:
//! - The keyed dataset snapshot (CSV, rewritten atomically after every success)
//! - The append-only JSONL journal mirroring every successful record
//! - The per-pass error ledger
//! - The item id list produced by the `crawl` command

mod ids;
mod journal;
mod ledger;
mod record;
mod snapshot;
mod traits;

pub use ids::{read_id_list, write_id_list};
pub use journal::Journal;
pub use ledger::{ErrorLedger, LedgerEntry};
pub use record::{Record, CSV_FIELDS};
pub use snapshot::{load_prior_snapshot, read_snapshot, write_csv_atomic, MergeStore};
pub use traits::{StorageError, StorageResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one harvested item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ItemId)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// One unit of work: an identity paired with the URL of its details page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub url: String,
}

impl Item {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id: ItemId(id),
            url: url.into(),
        }
    }
}

impl From<LedgerEntry> for Item {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            url: entry.url,
        }
    }
}

/// Deduplicates items by identity, keeping the first occurrence and its URL
pub fn dedup_items(items: impl IntoIterator<Item = Item>) -> Vec<Item> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id))
        .collect()
}
