//! # Download Coordinator
//!
//! Turns a URL into the path of its cached copy, downloading it on first
//! access. Concurrent requests for the same cache key share one download:
//! at most one fetch per key is in flight at any time, and every caller
//! waiting on it observes the same outcome.
//!
//! Per key the states are `NoEntry -> InFlight -> Cached | Failed`. `Cached`
//! is the file itself and survives restarts. `Failed` only ends one attempt;
//! the next call starts over. Nothing is retried automatically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::key::{key_for_url, parse_url};
use crate::cache::{CacheInfo, CacheKey, FileStore};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::{CacheConfig, CacheError, DownloaderConfig, ResolveOptions};

type SharedDownload = Shared<BoxFuture<'static, Result<PathBuf, CacheError>>>;

struct Inner {
    store: FileStore,
    fetcher: Arc<dyn Fetcher>,
    defaults: ResolveOptions,
    in_flight: Mutex<HashMap<CacheKey, SharedDownload>>,
}

/// Resolves URLs to locally cached files.
///
/// Cheap to clone; clones share the same in-flight table and store. Build
/// one per cache configuration and pass it to whoever needs it.
#[derive(Clone)]
pub struct DownloadCoordinator {
    inner: Arc<Inner>,
}

impl DownloadCoordinator {
    pub fn new(config: CacheConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let defaults = config.default_options();
        Self {
            inner: Arc::new(Inner {
                store: FileStore::new(config.cache_location),
                fetcher,
                defaults,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Coordinator fetching over HTTP with a client built from `http_config`
    pub fn http(config: CacheConfig, http_config: &DownloaderConfig) -> Result<Self, CacheError> {
        let fetcher = HttpFetcher::from_config(http_config)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn store(&self) -> &FileStore {
        &self.inner.store
    }

    /// Options used by [`resolve`](Self::resolve)
    pub fn default_options(&self) -> &ResolveOptions {
        &self.inner.defaults
    }

    /// Number of downloads currently in flight
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Resolve `url` with the configured default options
    pub async fn resolve(&self, url: &str) -> Result<PathBuf, CacheError> {
        self.resolve_with(url, &self.inner.defaults).await
    }

    /// Return the local path of `url`, downloading it if it is not cached yet.
    ///
    /// The download runs in its own task: it completes even if every caller
    /// stops awaiting it.
    pub async fn resolve_with(
        &self,
        url: &str,
        options: &ResolveOptions,
    ) -> Result<PathBuf, CacheError> {
        let parsed = parse_url(url)?;
        let key = key_for_url(&parsed, &options.query_policy);

        if let Some(path) = self.inner.store.lookup(&key).await? {
            debug!(key = %key, "Cache hit");
            return Ok(path);
        }

        self.join_or_start(key, parsed, &options.headers).await
    }

    /// Path `url` maps to under the default options, whether cached or not
    pub fn cache_path(&self, url: &str) -> Result<PathBuf, CacheError> {
        self.cache_path_with(url, &self.inner.defaults)
    }

    pub fn cache_path_with(&self, url: &str, options: &ResolveOptions) -> Result<PathBuf, CacheError> {
        Ok(self.inner.store.path_for(&self.key(url, options)?))
    }

    pub async fn is_cached(&self, url: &str) -> Result<bool, CacheError> {
        let key = self.key(url, &self.inner.defaults)?;
        Ok(self.inner.store.lookup(&key).await?.is_some())
    }

    /// Store a local file as the cached copy of `url`
    pub async fn seed(&self, url: &str, source: impl AsRef<Path>) -> Result<PathBuf, CacheError> {
        let key = self.key(url, &self.inner.defaults)?;
        self.inner.store.seed(&key, source.as_ref()).await
    }

    /// Remove the cached copy of `url` if there is one
    pub async fn delete(&self, url: &str) -> Result<(), CacheError> {
        let key = self.key(url, &self.inner.defaults)?;
        self.inner.store.remove(&key).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.inner.store.clear().await
    }

    pub async fn info(&self) -> Result<CacheInfo, CacheError> {
        self.inner.store.info().await
    }

    fn key(&self, url: &str, options: &ResolveOptions) -> Result<CacheKey, CacheError> {
        let parsed = parse_url(url)?;
        Ok(key_for_url(&parsed, &options.query_policy))
    }

    fn join_or_start(&self, key: CacheKey, url: Url, headers: &HeaderMap) -> SharedDownload {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(existing) = in_flight.get(&key) {
            debug!(key = %key, url = %url, "Joining in-flight download");
            return existing.clone();
        }

        let handle = tokio::spawn(download(
            Arc::clone(&self.inner),
            key.clone(),
            url,
            headers.clone(),
        ));

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(CacheError::Task(e.to_string())),
            }
        }
        .boxed()
        .shared();

        in_flight.insert(key, shared.clone());
        shared
    }
}

/// Removes the in-flight entry when the download task ends, panics included
struct InFlightGuard {
    inner: Arc<Inner>,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.key);
    }
}

async fn download(
    inner: Arc<Inner>,
    key: CacheKey,
    url: Url,
    headers: HeaderMap,
) -> Result<PathBuf, CacheError> {
    let _guard = InFlightGuard {
        inner: Arc::clone(&inner),
        key: key.clone(),
    };

    let started = Instant::now();
    let result = fetch_and_store(&inner, &key, &url, &headers).await;

    match &result {
        Ok(path) => info!(
            url = %url,
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cached resource"
        ),
        Err(e) => warn!(url = %url, key = %key, error = %e, "Download failed"),
    }

    result
}

async fn fetch_and_store(
    inner: &Inner,
    key: &CacheKey,
    url: &Url,
    headers: &HeaderMap,
) -> Result<PathBuf, CacheError> {
    // Another attempt or process may have materialized the entry meanwhile
    if let Some(path) = inner.store.lookup(key).await? {
        return Ok(path);
    }

    let body = inner.fetcher.fetch(url, headers).await?;
    inner.store.write_stream(key, body).await
}
