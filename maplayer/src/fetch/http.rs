//! HTTP client abstraction for testability.
//!
//! The pool workers download tiles through the [`TileFetcher`] trait, so a
//! mock client can stand in during tests. The real implementation wraps
//! `reqwest` with a request timeout; a timed-out fetch surfaces as an error
//! and its concurrency slot is released like any other failure.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use url::Url;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced while fetching a tile.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Failed to construct the HTTP client.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The request failed (connection, timeout, protocol).
    #[error("request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Trait for tile download operations.
///
/// Implementations must be `Send + Sync`; they are shared across all pool
/// workers.
pub trait TileFetcher: Send + Sync {
    /// Downloads the resource at `url`, returning the response body.
    fn fetch(&self, url: Url) -> BoxFuture<'_, Result<Bytes, FetchError>>;
}

/// Real fetcher implementation using reqwest.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

impl TileFetcher for ReqwestFetcher {
    fn fetch(&self, url: Url) -> BoxFuture<'_, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .bytes()
                .await
                .map_err(|e| FetchError::Http(e.to_string()))
        })
    }
}
