//! File-backed request cache
//!
//! Provides a `CacheStore` that keeps every cached payload in memory and
//! rewrites the backing JSON file in full whenever an entry is added.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::Payload;

/// Separator placed between the endpoint and each rendered parameter
const FINGERPRINT_SEPARATOR: &str = "_";

/// Errors that can occur when persisting the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The in-memory store could not be encoded as JSON
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing or renaming the cache file failed
    #[error("Failed to write cache file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Maps request fingerprints to previously fetched payloads
///
/// The store is single-writer: it is loaded once by `open` and every `put`
/// replaces the file on disk with the complete current contents. Two
/// processes sharing a file will overwrite each other; the last write wins.
#[derive(Debug)]
pub struct CacheStore {
    /// Location of the backing JSON file
    path: PathBuf,
    /// Cached payloads keyed by fingerprint
    entries: BTreeMap<String, Payload>,
}

impl CacheStore {
    /// Loads the cache from `path`
    ///
    /// Never fails. A missing file yields an empty store, and so does a file
    /// that cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "cache file unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no cache file, starting empty");
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "cache opened");
        Self { path, entries }
    }

    /// Builds the cache key for a request
    ///
    /// Each parameter is rendered as `key_value`; the rendered pairs are sorted
    /// and appended to the endpoint, all joined with `_`. Reordering the
    /// parameters never changes the result.
    pub fn fingerprint(endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut rendered: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}{FINGERPRINT_SEPARATOR}{value}"))
            .collect();
        rendered.sort();

        format!(
            "{endpoint}{FINGERPRINT_SEPARATOR}{}",
            rendered.join(FINGERPRINT_SEPARATOR)
        )
    }

    /// Returns the payload stored under `fingerprint`, if any
    pub fn get(&self, fingerprint: &str) -> Option<&Payload> {
        self.entries.get(fingerprint)
    }

    /// Stores `payload` under `fingerprint` and rewrites the cache file
    ///
    /// The new contents are written to a sibling temporary file which is then
    /// renamed over the cache file, so readers never see a half-written store.
    pub fn put(&mut self, fingerprint: impl Into<String>, payload: Payload) -> Result<(), CacheError> {
        self.entries.insert(fingerprint.into(), payload);
        self.persist()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), CacheError> {
        let io_error = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let json = serde_json::to_string(&self.entries)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json).map_err(io_error)?;
        fs::rename(&temp_path, &self.path).map_err(io_error)?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "cache written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
