//! Integration tests for Seda-Harvest
//!
//! These tests use wiremock to stand in for the listing pages, details pages
//! and media API, and drive the harvester end-to-end.

mod fetch_tests;
mod harvest_tests;
mod support;
