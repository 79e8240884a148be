//! Statistics over the persisted dataset and error ledger
//!
//! Backs the `stats` command. Reads only the files a harvest leaves behind.

use crate::storage::{read_snapshot, ErrorLedger, StorageResult};
use std::collections::HashMap;
use std::path::Path;

/// Dataset statistics summary
#[derive(Debug, Clone, Default)]
pub struct DatasetStatistics {
    /// Rows in the dataset snapshot
    pub rows: usize,

    /// Rows that carry a selected MP3 link
    pub rows_with_mp3: usize,

    /// Entries in the error ledger
    pub ledger_entries: usize,

    /// Ledger entries grouped by reason
    pub reasons: HashMap<String, usize>,
}

/// Loads statistics from the dataset snapshot and the error ledger
///
/// A missing file counts as empty.
pub fn load_statistics(books: &Path, errors: &Path) -> StorageResult<DatasetStatistics> {
    let records = match read_snapshot(books) {
        Ok(records) => records,
        Err(e) if e.is_not_found() => Default::default(),
        Err(e) => return Err(e),
    };
    let ledger = ErrorLedger::load(errors)?;

    let mut reasons = HashMap::new();
    for entry in ledger.entries() {
        *reasons.entry(reason_group(&entry.reason)).or_insert(0) += 1;
    }

    Ok(DatasetStatistics {
        rows: records.len(),
        rows_with_mp3: records
            .values()
            .filter(|r| r.full_mp3_url.as_deref().is_some_and(|u| !u.is_empty()))
            .count(),
        ledger_entries: ledger.len(),
        reasons,
    })
}

/// Leading part of a ledger reason, without URLs or nested causes
fn reason_group(reason: &str) -> String {
    let head = reason.split(": ").next().unwrap_or(reason);
    let head = head.split(" from ").next().unwrap_or(head);
    head.trim().to_string()
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics ===\n");

    println!("Overview:");
    println!("  Rows in dataset: {}", stats.rows);
    let percentage = if stats.rows > 0 {
        (stats.rows_with_mp3 as f64 / stats.rows as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Rows with MP3 link: {} ({:.1}%)",
        stats.rows_with_mp3, percentage
    );
    println!("  Ledger entries: {}", stats.ledger_entries);
    println!();

    if !stats.reasons.is_empty() {
        println!("Ledger by Reason:");
        let mut counts: Vec<_> = stats.reasons.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (reason, count) in counts {
            println!("  {}: {}", reason, count);
        }
    }
}
