//! Outbound HTTP transport
//!
//! The fetcher only needs "GET this endpoint with these query parameters and
//! hand back the body". `Transport` is that seam; `HttpTransport` implements it
//! with reqwest.

use futures::future::BoxFuture;
use reqwest::Client;

use super::FetchError;

/// Issues a single GET request and returns the raw response body
pub trait Transport: Send + Sync {
    fn get<'a>(
        &'a self,
        endpoint: &'a str,
        params: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Transport backed by a reqwest client
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new HttpTransport with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new HttpTransport with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn get<'a>(
        &'a self,
        endpoint: &'a str,
        params: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(endpoint)
                .query(params)
                .send()
                .await?
                .error_for_status()?;
            let body = response.bytes().await?;
            Ok(body.to_vec())
        })
    }
}
