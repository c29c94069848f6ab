//! # Cache
//!
//! Key derivation and on-disk storage. Neither part knows about the network;
//! the coordinator glues them to a [`Fetcher`](crate::Fetcher).

pub(crate) mod key;
mod store;

pub use key::{CacheKey, QueryPolicy, cacheable_url, key_for};
pub use store::{CacheInfo, FileStore};
