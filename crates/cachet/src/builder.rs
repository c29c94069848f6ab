//! # Configuration builders
//!
//! Fluent builders for [`DownloaderConfig`] and [`CacheConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cachet_engine::{CacheConfig, DownloaderConfig, QueryPolicy};
//!
//! let http = DownloaderConfig::builder()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_user_agent("MyApp/1.0")
//!     .build();
//!
//! let cache = CacheConfig::builder()
//!     .with_cache_location("/var/cache/images")
//!     .with_query_policy(QueryPolicy::only(["w", "h"]))
//!     .with_header("Authorization", "Bearer token")
//!     .build();
//!
//! assert_eq!(http.user_agent, "MyApp/1.0");
//! assert!(cache.headers.contains_key("authorization"));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::cache::QueryPolicy;
use crate::config::{CacheConfig, DownloaderConfig};

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    }
}

/// Builder for the HTTP client configuration
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
        }
    }

    /// Overall request timeout, zero disables it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a default header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_header(&mut self.config.headers, name.as_ref(), value.as_ref());
        self
    }

    /// Merge `headers` over the defaults
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    pub fn with_cache_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.config.cache_location = location.into();
        self
    }

    pub fn with_query_policy(mut self, policy: impl Into<QueryPolicy>) -> Self {
        self.config.query_policy = policy.into();
        self
    }

    /// Add a header override sent with every fetch
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_header(&mut self.config.headers, name.as_ref(), value.as_ref());
        self
    }

    /// Replace all header overrides
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
