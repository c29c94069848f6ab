//! Network seam: the single request issued behind a cache miss.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::debug;
use url::Url;

use crate::{CacheError, DownloaderConfig, create_client};

/// Response body as a stream of chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, CacheError>>;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue one request for `url` with `headers` merged over the client
    /// defaults. Never retries.
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<ByteStream, CacheError>;
}

/// [`Fetcher`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: Client,
}

impl HttpFetcher {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    pub fn from_config(config: &DownloaderConfig) -> Result<Self, CacheError> {
        Ok(Self::new(create_client(config)?))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<ByteStream, CacheError> {
        let response = self
            .http_client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Status {
                url: url.to_string(),
                status,
            });
        }

        debug!(
            url = %url,
            status = %status,
            content_length = ?response.content_length(),
            "Fetching resource body"
        );

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| CacheError::Stream(e.to_string())))
            .boxed())
    }
}
