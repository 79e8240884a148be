//! Site collaborators
//!
//! The harvest core only talks to a site through three seams:
//! - [`Listing`] enumerates items page by page
//! - [`Extractor`] turns a fetched details page into a [`Record`]
//! - [`MediaSource`] builds the access link and looks up media candidates
//!
//! The IranSeda implementations live in the submodules.

mod details;
mod listing;
mod media;

pub use details::DetailsExtractor;
pub use listing::{collect_items, TagListing};
pub use media::{MediaApi, DEFAULT_API_BASE, DEFAULT_PLAYER_BASE};

use crate::crawler::FetchError;
use crate::storage::{Item, ItemId, Record};
use async_trait::async_trait;
use thiserror::Error;

/// Root that relative site links are resolved against
pub const SITE_BASE: &str = "https://book.iranseda.ir/";

/// Source of items, one listing page at a time
#[async_trait]
pub trait Listing: Send + Sync {
    /// Items on page `page` (1-based), in document order
    async fn enumerate(&self, page: u32) -> Result<Vec<Item>, FetchError>;
}

/// Errors raised while extracting a record from fetched content
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("empty document")]
    Empty,
}

/// Turns raw page content into a (possibly incomplete) record
///
/// Implementations must be deterministic and free of side effects.
pub trait Extractor: Send + Sync {
    fn extract(&self, content: &str, source_url: &str) -> Result<Record, ExtractError>;
}

/// One downloadable media file offered for an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub url: String,
    /// Size in bytes, 0 when unknown
    pub size: u64,
    /// Bitrate in kbps
    pub quality: Option<u32>,
}

impl MediaCandidate {
    pub fn new(url: impl Into<String>, size: u64, quality: Option<u32>) -> Self {
        Self {
            url: url.into(),
            size,
            quality,
        }
    }
}

/// Secondary enrichment keyed by the item id and its attachment id
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Public access link for the item
    fn access_link(&self, id: ItemId, attachment_id: u64) -> String;

    /// Media candidates for the item; an empty list is not an error
    async fn lookup(
        &self,
        id: ItemId,
        attachment_id: u64,
    ) -> Result<Vec<MediaCandidate>, FetchError>;
}
