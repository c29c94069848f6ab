use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::builder::{CacheConfigBuilder, DownloaderConfigBuilder};
use crate::cache::QueryPolicy;

const DEFAULT_USER_AGENT: &str = concat!("cachet/", env!("CARGO_PKG_VERSION"));

/// Directory name used under the system temp dir when no cache location is given
const DEFAULT_CACHE_DIR: &str = "cachet-cache";

/// HTTP client options
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a request, zero disables it
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with every request
    pub headers: HeaderMap,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> DownloaderConfigBuilder {
        DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("image/*,*/*;q=0.8"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

/// Options controlling how the coordinator maps URLs to cache entries
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory of the cache
    pub cache_location: PathBuf,

    /// Default query policy for key derivation
    pub query_policy: QueryPolicy,

    /// Default per-request header overrides
    pub headers: HeaderMap,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_location: std::env::temp_dir().join(DEFAULT_CACHE_DIR),
            query_policy: QueryPolicy::default(),
            headers: HeaderMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Options applied by `resolve` calls that don't pass their own
    pub fn default_options(&self) -> ResolveOptions {
        ResolveOptions {
            query_policy: self.query_policy.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// Per-call options for a resolve
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Which query parameters identify the resource
    pub query_policy: QueryPolicy,

    /// Headers merged over the client defaults for the fetch
    pub headers: HeaderMap,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_policy(mut self, policy: impl Into<QueryPolicy>) -> Self {
        self.query_policy = policy.into();
        self
    }

    /// Add a header override. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }
}
