//! Configuration module for Seda-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use seda_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Will walk {} listing pages", config.listing.pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, FilterConfig, HttpConfig, ListingConfig, LoggingConfig, OutputConfig,
    ParallelConfig, RetryConfig, SweepConfig, ThrottleConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_enrichment, MAX_BACKOFF_FACTOR, MAX_DELAY_SECS};
