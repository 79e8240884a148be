//! Seda-Harvest: an incremental catalog harvester
//!
//! This crate turns a paginated listing of items into a durable, deduplicated
//! dataset. Each item is fetched, enriched with a secondary media lookup and
//! upserted into a keyed CSV snapshot. Items that fail are written to an error
//! ledger and retried by slower serial sweep passes until the ledger empties or
//! the sweep budget runs out.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod site;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

pub use crawler::FetchError;

/// Main error type for Seda-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Listing failed: {0}")]
    Listing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_harvest, Fetcher, RetryPolicy, SweepController, Throttle};
pub use output::HarvestReport;
pub use state::{ItemOutcome, PassState};
pub use storage::{Item, ItemId, Record};
