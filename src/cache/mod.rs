//! Cache module for memoizing HTTP responses on disk
//!
//! This module provides a `CacheStore` that maps a deterministic request
//! fingerprint to the normalized payload of that request. The whole store lives
//! in a single JSON file which is loaded once and rewritten on every insert.
//! Entries never expire.

mod payload;
mod store;

pub use payload::{CsvPayload, CsvRow, HtmlPayload, Payload};
pub use store::{CacheError, CacheStore};
