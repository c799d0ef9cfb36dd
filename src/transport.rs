//! HTTP transport: the injected fetch capability
//!
//! The engine never talks to reqwest directly; it goes through the
//! [`Transport`] trait so tests can substitute an in-memory fake and callers
//! can share one HTTP client across concurrent syncs.

use crate::config::SyncOptions;
use crate::error::{Error, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use url::Url;

/// Fetch capability consumed by the sync engine
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Check that the remote file exists (HEAD request)
    async fn exists(&self, url: &Url) -> Result<bool>;

    /// Fetch the whole resource body
    async fn fetch(&self, url: &Url) -> Result<Bytes>;

    /// Fetch an inclusive byte range (`bytes=start-end`)
    async fn fetch_range(&self, url: &Url, start: u64, end: u64) -> Result<Bytes>;

    /// Stream the whole resource body, for full downloads of large files
    async fn fetch_stream(&self, url: &Url) -> Result<BoxStream<'static, Result<Bytes>>>;
}

/// reqwest-backed transport with a shared connection pool.
///
/// Clone is cheap; the inner client is reference-counted and safe to use from
/// multiple in-flight syncs.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the configured per-request timeout
    pub fn new(options: &SyncOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout())
            .build()
            .map_err(|e| Error::Network {
                message: "building HTTP client".to_string(),
                source: Some(e),
            })?;
        Ok(Self { client })
    }
}

/// Only a definitive 404 means the file is absent. Any other non-success
/// status (a 503, a proxy error) is a network failure and stays retryable.
fn head_status_to_existence(status: reqwest::StatusCode, url: &Url) -> Result<bool> {
    if status.is_success() {
        Ok(true)
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Ok(false)
    } else {
        Err(Error::network(format!(
            "HEAD {} failed with status {}",
            url, status
        )))
    }
}

impl Transport for HttpTransport {
    async fn exists(&self, url: &Url) -> Result<bool> {
        let response = self
            .client
            .head(url.as_str())
            .send()
            .await
            .map_err(|e| Error::Network {
                message: format!("HEAD {}", url),
                source: Some(e),
            })?;
        head_status_to_existence(response.status(), url)
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Network {
                message: format!("GET {}", url),
                source: Some(e),
            })?;
        response.bytes().await.map_err(|e| Error::Network {
            message: format!("reading body of {}", url),
            source: Some(e),
        })
    }

    async fn fetch_range(&self, url: &Url, start: u64, end: u64) -> Result<Bytes> {
        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(|e| Error::Network {
                message: format!("GET {} bytes={}-{}", url, start, end),
                source: Some(e),
            })?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "range request bytes={}-{} of {} failed with status {}",
                start,
                end,
                url,
                response.status()
            )));
        }

        response.bytes().await.map_err(|e| Error::Network {
            message: format!("reading range body of {}", url),
            source: Some(e),
        })
    }

    async fn fetch_stream(&self, url: &Url) -> Result<BoxStream<'static, Result<Bytes>>> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Network {
                message: format!("GET {}", url),
                source: Some(e),
            })?;

        let url = url.clone();
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| Error::Network {
                message: format!("streaming body of {}", url),
                source: Some(e),
            })
        });

        Ok(stream.boxed())
    }
}
