//! Item id list exchanged between the `crawl` and `enrich` commands

use crate::storage::traits::{StorageError, StorageResult};
use crate::storage::{Item, ItemId};
use crate::url::resolve_url;
use std::fs;
use std::path::Path;
use url::Url;

const ID_HEADER: &[&str] = &["AudioBookID", "URL"];

/// Writes items as `AudioBookID,URL` rows
pub fn write_id_list(path: &Path, items: &[Item]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(ID_HEADER)?;
    for item in items {
        writer.write_record([item.id.to_string().as_str(), item.url.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads an id list written by [`write_id_list`] or by hand
///
/// Relative URLs such as `./DetailsAlbum/?g=7` are resolved against `base`.
pub fn read_id_list(path: &Path, base: &Url) -> StorageResult<Vec<Item>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut items = Vec::new();

    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let (Some(id), Some(url)) = (row.get(0), row.get(1)) else {
            return Err(malformed(path, line, "expected two columns"));
        };
        let id = id
            .parse::<ItemId>()
            .map_err(|e| malformed(path, line, &format!("bad id '{}': {}", id, e)))?;
        let url = resolve_url(base, url)
            .map_err(|e| malformed(path, line, &format!("bad url: {}", e)))?;
        items.push(Item { id, url });
    }

    Ok(items)
}

fn malformed(path: &Path, line: usize, message: &str) -> StorageError {
    StorageError::Malformed {
        path: path.display().to_string(),
        message: format!("row {}: {}", line + 1, message),
    }
}
