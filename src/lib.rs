//! covidmap library
//!
//! Exposes the cache, fetch, ingest and render layers for the binary and for
//! integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod data;
pub mod fetch;
pub mod logging;
pub mod refresh;
pub mod render;
pub mod search;
pub mod ui;
