//! Disk-backed content cache
//!
//! One file per URL, named by the SHA-256 of the exact URL string. Reads never
//! fail: a missing, unreadable or non-UTF-8 entry is reported as absent and the
//! caller falls through to a network fetch.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DiskCache {
    base: PathBuf,
}

impl DiskCache {
    /// Opens a cache rooted at `base`, creating the directory if needed
    pub fn open(base: impl Into<PathBuf>) -> io::Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Fixed-length cache key for a URL
    ///
    /// Any change to the URL, including its query string, changes the key.
    pub fn key_for(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.base.join(format!("{}.html", Self::key_for(url)))
    }

    /// Returns the cached content for `url`, if any
    pub fn get(&self, url: &str) -> Option<String> {
        let path = self.path_for(url);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Stores `content` for `url`, silently replacing any existing entry
    ///
    /// The entry is written to a temporary file and renamed into place, so a
    /// crash never leaves a truncated entry behind.
    pub fn set(&self, url: &str, content: &str) -> io::Result<()> {
        let path = self.path_for(url);
        let tmp = path.with_extension("html.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}
