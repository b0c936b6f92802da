//! Cached request fetching
//!
//! This module provides the `Fetcher`, which answers requests from its
//! `CacheStore` when it can and otherwise goes to the network through a
//! `Transport`, normalizing the response into the payload shape for the
//! requested mode before caching it.

mod decode;
mod transport;

pub use decode::{decode, parse_csv};
pub use transport::{HttpTransport, Transport};

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheError, CacheStore, CsvRow, Payload};

/// How a response should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Structured JSON response, cached as returned
    Api,
    /// Delimited text with a header row, cached as rows
    Csv,
    /// Plain text, cached verbatim
    Html,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchMode::Api => "an API response",
            FetchMode::Csv => "CSV rows",
            FetchMode::Html => "text",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when fetching a resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// A non-HTTP transport could not produce a response
    #[error("Transport failed: {0}")]
    Transport(String),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Failed to parse CSV response
    #[error("Failed to parse CSV response: {0}")]
    CsvError(#[from] csv::Error),

    /// Response body is not UTF-8 text
    #[error("Response is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    /// A cached entry has a different shape than the one requested
    #[error("Cached entry {fingerprint} is not {expected}")]
    UnexpectedPayload {
        fingerprint: String,
        expected: FetchMode,
    },

    /// The fetched payload could not be written to the cache
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Fetches resources through a request cache
///
/// The fetcher owns the cache so that every caller that needs cached requests
/// shares one explicit instance instead of ambient state.
pub struct Fetcher {
    cache: CacheStore,
    transport: Box<dyn Transport>,
}

impl Fetcher {
    /// Creates a fetcher over `cache` that misses to `transport`
    pub fn new(cache: CacheStore, transport: impl Transport + 'static) -> Self {
        Self {
            cache,
            transport: Box::new(transport),
        }
    }

    /// The underlying cache
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Fetches `endpoint` with `params`, consulting the cache first
    ///
    /// # Returns
    /// * `Ok(Payload)` shaped for `mode`: `Payload::Api` for API mode,
    ///   `Payload::Csv` for CSV mode and `Payload::Html` for HTML mode
    /// * `Err(FetchError)` if the request, decoding or cache write fails, or
    ///   a cached entry has the wrong shape for a CSV or HTML request
    pub async fn fetch(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
        mode: FetchMode,
    ) -> Result<Payload, FetchError> {
        self.fetch_cacheable(endpoint, params, mode, |_| true).await
    }

    /// Like [`Fetcher::fetch`], but only payloads accepted by `cacheable`
    /// are stored
    ///
    /// A rejected response is still returned to the caller. A cached entry
    /// that `cacheable` rejects is treated as a miss and fetched again.
    pub async fn fetch_cacheable(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
        mode: FetchMode,
        cacheable: impl Fn(&Payload) -> bool,
    ) -> Result<Payload, FetchError> {
        let fingerprint = CacheStore::fingerprint(endpoint, params);

        if let Some(cached) = self.cache.get(&fingerprint) {
            if cacheable(cached) {
                info!(endpoint, "using cache");
                return shape_for_mode(cached.clone(), mode, fingerprint);
            }
            info!(endpoint, "cached entry rejected, refetching");
        }

        info!(endpoint, "fetching");
        let body = self.transport.get(endpoint, params).await?;
        let payload = decode(body, mode)?;
        if cacheable(&payload) {
            self.cache.put(fingerprint, payload.clone())?;
        } else {
            warn!(endpoint, "response not cached");
        }

        Ok(payload)
    }

    /// Fetches a structured API response
    pub async fn fetch_api(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let payload = self.fetch(endpoint, params, FetchMode::Api).await?;
        Ok(payload.into_value())
    }

    /// Fetches a structured API response, caching it only if `cacheable`
    /// accepts it
    pub async fn fetch_api_if(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
        cacheable: impl Fn(&Value) -> bool,
    ) -> Result<Value, FetchError> {
        let payload = self
            .fetch_cacheable(endpoint, params, FetchMode::Api, |payload| match payload {
                Payload::Api(value) => cacheable(value),
                _ => true,
            })
            .await?;
        Ok(payload.into_value())
    }

    /// Fetches a CSV resource as rows keyed by header
    pub async fn fetch_csv(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<CsvRow>, FetchError> {
        let fingerprint = CacheStore::fingerprint(endpoint, params);
        match self.fetch(endpoint, params, FetchMode::Csv).await? {
            Payload::Csv(csv) => Ok(csv.csv),
            _ => Err(FetchError::UnexpectedPayload {
                fingerprint,
                expected: FetchMode::Csv,
            }),
        }
    }

    /// Fetches a resource as plain text
    pub async fn fetch_html(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let fingerprint = CacheStore::fingerprint(endpoint, params);
        match self.fetch(endpoint, params, FetchMode::Html).await? {
            Payload::Html(html) => Ok(html.html),
            _ => Err(FetchError::UnexpectedPayload {
                fingerprint,
                expected: FetchMode::Html,
            }),
        }
    }
}

/// Reshapes a cache hit for the requested mode
fn shape_for_mode(
    cached: Payload,
    mode: FetchMode,
    fingerprint: String,
) -> Result<Payload, FetchError> {
    match (mode, cached) {
        (FetchMode::Api, payload) => Ok(Payload::Api(payload.into_value())),
        (FetchMode::Csv, payload @ Payload::Csv(_)) => Ok(payload),
        (FetchMode::Html, payload @ Payload::Html(_)) => Ok(payload),
        (expected, _) => Err(FetchError::UnexpectedPayload {
            fingerprint,
            expected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const CSV_URL: &str = "https://data.example.com/locations.csv";
    const API_URL: &str = "https://maps.example.com/geocode/json";

    /// Transport serving canned bodies by endpoint and counting calls
    #[derive(Clone, Default)]
    struct FixtureTransport {
        bodies: HashMap<String, Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    impl FixtureTransport {
        fn with_body(mut self, endpoint: &str, body: &str) -> Self {
            self.bodies.insert(endpoint.to_string(), body.as_bytes().to_vec());
            self
        }
    }

    impl Transport for FixtureTransport {
        fn get<'a>(
            &'a self,
            endpoint: &'a str,
            _params: &'a [(&'a str, &'a str)],
        ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = self
                .bodies
                .get(endpoint)
                .cloned()
                .ok_or_else(|| FetchError::Transport(format!("no fixture for {endpoint}")));
            Box::pin(async move { body })
        }
    }

    fn create_fetcher(transport: FixtureTransport) -> (Fetcher, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheStore::open(temp_dir.path().join("covid_cache.json"));
        (Fetcher::new(cache, transport), temp_dir)
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches_csv_rows() {
        let transport = FixtureTransport::default().with_body(CSV_URL, "location\nChad\nPeru\n");
        let calls = transport.calls.clone();
        let (mut fetcher, _temp_dir) = create_fetcher(transport);

        let rows = fetcher.fetch_csv(CSV_URL, &[]).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("location"), Some("Peru"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_hit_does_not_call_transport() {
        let transport = FixtureTransport::default().with_body(API_URL, r#"{"status":"OK"}"#);
        let calls = transport.calls.clone();
        let (mut fetcher, _temp_dir) = create_fetcher(transport);
        let params = [("address", "Chad"), ("key", "k")];

        let first = fetcher.fetch_api(API_URL, &params).await.unwrap();
        let second = fetcher
            .fetch_api(API_URL, &[("key", "k"), ("address", "Chad")])
            .await
            .unwrap();

        assert_eq!(first, json!({"status": "OK"}));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_entries_survive_new_fetcher() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("covid_cache.json");

        let transport = FixtureTransport::default().with_body(CSV_URL, "<h1>page</h1>");
        let mut fetcher = Fetcher::new(CacheStore::open(&path), transport);
        fetcher.fetch_html(CSV_URL, &[]).await.unwrap();

        let empty = FixtureTransport::default();
        let calls = empty.calls.clone();
        let mut reopened = Fetcher::new(CacheStore::open(&path), empty);
        let text = reopened.fetch_html(CSV_URL, &[]).await.unwrap();

        assert_eq!(text, "<h1>page</h1>");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_api_mode_returns_wrapped_shape_on_hit() {
        let transport = FixtureTransport::default().with_body(CSV_URL, "a\n1\n");
        let (mut fetcher, _temp_dir) = create_fetcher(transport);
        fetcher.fetch_csv(CSV_URL, &[]).await.unwrap();

        let value = fetcher.fetch_api(CSV_URL, &[]).await.unwrap();

        assert_eq!(value, json!({"csv": [{"a": "1"}]}));
    }

    #[tokio::test]
    async fn test_csv_mode_rejects_cached_text() {
        let transport = FixtureTransport::default().with_body(CSV_URL, "plain");
        let (mut fetcher, _temp_dir) = create_fetcher(transport);
        fetcher.fetch_html(CSV_URL, &[]).await.unwrap();

        let result = fetcher.fetch_csv(CSV_URL, &[]).await;

        assert!(matches!(
            result,
            Err(FetchError::UnexpectedPayload {
                expected: FetchMode::Csv,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_and_caches_nothing() {
        let (mut fetcher, _temp_dir) = create_fetcher(FixtureTransport::default());

        let result = fetcher.fetch_api(API_URL, &[("address", "Chad")]).await;

        assert!(matches!(result, Err(FetchError::Transport(_))));
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_response_is_returned_but_not_cached() {
        let transport = FixtureTransport::default().with_body(API_URL, r#"{"status":"UNKNOWN_ERROR"}"#);
        let calls = transport.calls.clone();
        let (mut fetcher, _temp_dir) = create_fetcher(transport);
        let accept_ok = |value: &Value| value["status"] == "OK";

        let first = fetcher.fetch_api_if(API_URL, &[], accept_ok).await.unwrap();
        fetcher.fetch_api_if(API_URL, &[], accept_ok).await.unwrap();

        assert_eq!(first, json!({"status": "UNKNOWN_ERROR"}));
        assert!(fetcher.cache().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_cache_entry_is_refetched() {
        let transport = FixtureTransport::default().with_body(API_URL, r#"{"status":"OK"}"#);
        let calls = transport.calls.clone();
        let (mut fetcher, _temp_dir) = create_fetcher(transport);
        let fingerprint = CacheStore::fingerprint(API_URL, &[]);
        fetcher
            .cache
            .put(fingerprint.clone(), Payload::Api(json!({"status": "OVER_QUERY_LIMIT"})))
            .unwrap();

        let value = fetcher
            .fetch_api_if(API_URL, &[], |value| value["status"] == "OK")
            .await
            .unwrap();

        assert_eq!(value, json!({"status": "OK"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fetcher.cache().get(&fingerprint),
            Some(&Payload::Api(json!({"status": "OK"})))
        );
    }

    #[tokio::test]
    async fn test_decode_failure_caches_nothing() {
        let transport = FixtureTransport::default().with_body(API_URL, "not json");
        let (mut fetcher, _temp_dir) = create_fetcher(transport);

        let result = fetcher.fetch_api(API_URL, &[]).await;

        assert!(matches!(result, Err(FetchError::ParseError(_))));
        assert!(fetcher.cache().is_empty());
    }
}
