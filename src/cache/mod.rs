//! Content cache for fetched pages
//!
//! Maps a request URL to the raw content previously fetched from it so that
//! later runs of the same campaign skip the network. Entries never expire;
//! content is assumed stable for the lifetime of a crawl campaign.

mod disk;

pub use disk::DiskCache;
