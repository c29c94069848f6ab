//! # Cachet
//!
//! Download-and-cache coordination for URL-addressed resources such as
//! remote images. A URL resolves to a file under a cache root; the file is
//! fetched at most once per cache key no matter how many callers ask for it
//! concurrently, and it is written atomically so readers never see partial
//! content.
//!
//! ## Features
//!
//! - Deterministic SHA-1 cache keys grouped into per-host directories
//! - Configurable query parameter policy for resource identity
//! - In-flight request deduplication with a shared outcome
//! - Temp-file-then-rename materialization
//! - Best-effort bounded-concurrency preloading
//!
//! ## Example
//!
//! ```no_run
//! use cachet_engine::{CacheConfig, DownloadCoordinator, DownloaderConfig, preload};
//!
//! # async fn run() -> Result<(), cachet_engine::CacheError> {
//! let config = CacheConfig::builder().with_cache_location("/tmp/images").build();
//! let coordinator = DownloadCoordinator::http(config, &DownloaderConfig::default())?;
//!
//! let path = coordinator.resolve("https://img.example.com/cat.png").await?;
//! println!("cached at {}", path.display());
//!
//! let summary = preload(
//!     ["https://img.example.com/a.png", "https://img.example.com/b.png"],
//!     &coordinator,
//!     4,
//! )
//! .await;
//! println!("{} of {} cached", summary.cached, summary.requested);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod preload;

#[cfg(test)]
mod test_utils;

pub use builder::{CacheConfigBuilder, DownloaderConfigBuilder};
pub use cache::{CacheInfo, CacheKey, FileStore, QueryPolicy, cacheable_url, key_for};
pub use client::create_client;
pub use config::{CacheConfig, DownloaderConfig, ResolveOptions};
pub use coordinator::DownloadCoordinator;
pub use error::CacheError;
pub use fetcher::{ByteStream, Fetcher, HttpFetcher};
pub use preload::{PreloadScheduler, PreloadSummary, preload, preload_with};
