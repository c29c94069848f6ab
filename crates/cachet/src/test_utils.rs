use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

use crate::fetcher::{ByteStream, Fetcher};
use crate::{CacheConfig, CacheError, DownloadCoordinator};

/// Initialize tracing for tests, DEBUG by default
macro_rules! init_test_tracing {
    () => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

pub(crate) use init_test_tracing;

/// How the mock answers a given URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Ok,
    Status(StatusCode),
    BrokenBody,
}

/// In-memory [`Fetcher`] that counts requests and serves the URL path as body
#[derive(Default)]
pub struct MockFetcher {
    delay: Duration,
    failing: HashSet<String>,
    broken: HashSet<String>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
    headers_seen: Mutex<Vec<HeaderMap>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer 500 for this path
    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Send one chunk then fail the body stream for this path
    pub fn broken(mut self, path: &str) -> Self {
        self.broken.insert(path.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    pub fn headers_seen(&self) -> Vec<HeaderMap> {
        self.headers_seen.lock().clone()
    }

    fn behaviour(&self, url: &Url) -> Behaviour {
        if self.failing.contains(url.path()) {
            Behaviour::Status(StatusCode::INTERNAL_SERVER_ERROR)
        } else if self.broken.contains(url.path()) {
            Behaviour::BrokenBody
        } else {
            Behaviour::Ok
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<ByteStream, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(url.to_string());
        self.headers_seen.lock().push(headers.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let body = Bytes::from(url.path().to_string());
        match self.behaviour(url) {
            Behaviour::Ok => Ok(futures::stream::iter(vec![Ok(body)]).boxed()),
            Behaviour::Status(status) => Err(CacheError::Status {
                url: url.to_string(),
                status,
            }),
            Behaviour::BrokenBody => Ok(futures::stream::iter(vec![
                Ok(body),
                Err(CacheError::Stream("connection reset".to_string())),
            ])
            .boxed()),
        }
    }
}

/// Coordinator rooted at `root` backed by `fetcher`
pub fn coordinator(root: &std::path::Path, fetcher: Arc<MockFetcher>) -> DownloadCoordinator {
    let config = CacheConfig::builder().with_cache_location(root).build();
    DownloadCoordinator::new(config, fetcher)
}
