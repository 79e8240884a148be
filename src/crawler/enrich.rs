//! Fetch-and-enrich step for a single item
//!
//! 1. Read the details page from the cache, or fetch it and cache it
//! 2. Extract a record, falling back to the item's own id
//! 3. Build the access link and look up media candidates
//! 4. Filter candidates by size and pick the best one
//! 5. Reject records missing a title or access link

use crate::cache::DiskCache;
use crate::config::FilterConfig;
use crate::crawler::{FetchError, Fetcher};
use crate::site::{Extractor, MediaCandidate, MediaSource};
use crate::state::{FailureKind, ItemOutcome};
use crate::storage::Item;
use std::sync::Arc;

/// Reason recorded when `require_media` is set and nothing qualifies
pub const NO_MEDIA_REASON: &str = "no mp3 meets filters";

/// Candidate filtering rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaFilter {
    /// Candidates smaller than this many bytes are ignored
    pub min_size: u64,
    /// Skip the item when no candidate survives the size filter
    pub require_media: bool,
}

impl From<&FilterConfig> for MediaFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            min_size: config.min_mp3_size_bytes,
            require_media: config.require_full_mp3,
        }
    }
}

/// Runs the per-item pipeline against the site collaborators
pub struct Enricher {
    fetcher: Fetcher,
    cache: Option<DiskCache>,
    extractor: Arc<dyn Extractor>,
    media: Option<Arc<dyn MediaSource>>,
    filter: MediaFilter,
}

impl Enricher {
    pub fn new(fetcher: Fetcher, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            fetcher,
            cache: None,
            extractor,
            media: None,
            filter: MediaFilter::default(),
        }
    }

    pub fn with_cache(mut self, cache: Option<DiskCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaSource>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_filter(mut self, filter: MediaFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Processes one item; never fails, every problem becomes an outcome
    pub async fn process(&self, item: &Item) -> ItemOutcome {
        let content = match self.load(&item.url).await {
            Ok(content) => content,
            Err(e) => return ItemOutcome::Err(FailureKind::Fetch, e.to_string()),
        };

        let mut record = match self.extractor.extract(&content, &item.url) {
            Ok(record) => record,
            Err(e) => {
                return ItemOutcome::Err(FailureKind::Extract, format!("extract failed: {}", e))
            }
        };
        let id = *record.id.get_or_insert(item.id);

        let mut candidates = Vec::new();
        if let (Some(media), Some(attachment_id)) = (&self.media, record.attachment_id) {
            record.player_link = Some(media.access_link(id, attachment_id));
            candidates = match media.lookup(id, attachment_id).await {
                Ok(found) => found,
                Err(e) => {
                    return ItemOutcome::Err(
                        FailureKind::Fetch,
                        format!("media lookup failed: {}", e),
                    )
                }
            };
        }

        candidates.retain(|c| c.size >= self.filter.min_size);
        if self.filter.require_media && candidates.is_empty() {
            return ItemOutcome::Skipped(NO_MEDIA_REASON.to_string());
        }

        record.full_mp3_url = select_best(&candidates).map(|c| c.url.clone());
        record.all_mp3s = join_unique_urls(&candidates);

        if !record.is_complete() {
            return ItemOutcome::Err(
                FailureKind::Incomplete,
                format!("incomplete record: missing {}", record.missing_fields().join(", ")),
            );
        }

        ItemOutcome::Ok(record)
    }

    /// Cached content, or a fresh fetch that is cached before returning
    async fn load(&self, url: &str) -> Result<String, FetchError> {
        if let Some(content) = self.cache.as_ref().and_then(|c| c.get(url)) {
            tracing::debug!("Cache hit for {}", url);
            return Ok(content);
        }

        let content = self.fetcher.fetch(url).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(url, &content) {
                tracing::warn!("Failed to cache {}: {}", url, e);
            }
        }

        Ok(content)
    }
}

/// Largest candidate, then highest quality; the earliest wins a full tie
pub fn select_best(candidates: &[MediaCandidate]) -> Option<&MediaCandidate> {
    let rank = |c: &MediaCandidate| (c.size, c.quality.unwrap_or(0));

    candidates.iter().fold(None, |best, candidate| match best {
        Some(current) if rank(candidate) <= rank(current) => Some(current),
        _ => Some(candidate),
    })
}

/// Candidate URLs in order, without repeats, joined by `", "`
pub fn join_unique_urls(candidates: &[MediaCandidate]) -> Option<String> {
    let mut urls: Vec<&str> = Vec::new();
    for candidate in candidates {
        if !urls.contains(&candidate.url.as_str()) {
            urls.push(&candidate.url);
        }
    }

    if urls.is_empty() {
        None
    } else {
        Some(urls.join(", "))
    }
}
