use std::path::PathBuf;
use std::sync::Arc;

use reqwest::StatusCode;

/// Error type shared by every cache operation.
///
/// The type is `Clone` so a single download outcome can be handed to every
/// caller waiting on the same cache key. Non-cloneable sources are wrapped
/// in `Arc`.
#[derive(Debug, thiserror::Error, Clone)]
pub enum CacheError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Server returned status code {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("Network error: {source}")]
    Network {
        #[from]
        source: Arc<reqwest::Error>,
    },

    #[error("Body stream error: {0}")]
    Stream(String),

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("HTTP client configuration error: {0}")]
    Client(String),

    #[error("Download task failed: {0}")]
    Task(String),
}

impl CacheError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Storage {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// The URL could not be turned into a cache key; no network access happened.
    pub fn is_invalid_url(&self) -> bool {
        matches!(self, CacheError::InvalidUrl(_))
    }

    /// Transport failure or non-success response.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            CacheError::Status { .. } | CacheError::Network { .. } | CacheError::Stream(_)
        )
    }

    /// Temp-file write, fsync, directory creation or rename failure.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, CacheError::Storage { .. })
    }
}

// Manual implementation because of the Arc wrapping.
impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Network {
            source: Arc::new(err),
        }
    }
}

impl From<url::ParseError> for CacheError {
    fn from(err: url::ParseError) -> Self {
        CacheError::InvalidUrl(err.to_string())
    }
}
