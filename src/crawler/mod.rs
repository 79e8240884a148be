//! Crawler module for fetching and enriching items
//!
//! This module contains the core harvest logic, including:
//! - HTTP fetching with classified errors and retry with backoff
//! - Randomized per-item throttling
//! - The per-item fetch-and-enrich step
//! - Pass coordination (pass 1 worker pool, serial sweeps)

mod coordinator;
mod enrich;
mod fetcher;
mod retry;
mod throttle;

pub use coordinator::{build_enricher, run_harvest, PassOptions, SweepController};
pub use enrich::{join_unique_urls, select_best, Enricher, MediaFilter, NO_MEDIA_REASON};
pub use fetcher::{build_http_client, decode_body, FetchError, Fetcher};
pub use retry::{RetryPolicy, Retryable};
pub use throttle::Throttle;
