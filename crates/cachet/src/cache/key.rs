//! # Cache Keys
//!
//! Deterministic mapping from a URL to its relative location inside the cache
//! root. Pure functions only: nothing here touches the network or the disk.
//!
//! A key has two parts:
//!
//! - a host bucket, `{sanitized_host}_{sha1(host)}`, grouping every entry of
//!   one host under one directory;
//! - a file name, `{sha1(dir + file + extension + query)}.{extension}`.

use std::fmt;
use std::path::PathBuf;

use sha1::{Digest, Sha1};
use url::{Url, form_urlencoded};

use crate::error::CacheError;

/// Extensions kept as-is. Anything else is stored as `jpg`.
const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpeg", "jpg", "gif", "bmp", "tiff", "tif"];
const DEFAULT_EXTENSION: &str = "jpg";

/// Which query parameters take part in the identity of a cached resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryPolicy {
    /// Drop every query parameter
    #[default]
    None,
    /// Keep every query parameter
    All,
    /// Keep only the named parameters
    Only(Vec<String>),
}

impl QueryPolicy {
    /// Keep only the given parameter names
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryPolicy::Only(names.into_iter().map(Into::into).collect())
    }

    fn includes(&self, name: &str) -> bool {
        match self {
            QueryPolicy::None => false,
            QueryPolicy::All => true,
            QueryPolicy::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

impl From<bool> for QueryPolicy {
    fn from(include: bool) -> Self {
        if include {
            QueryPolicy::All
        } else {
            QueryPolicy::None
        }
    }
}

/// Location of a cached resource relative to the cache root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    host_bucket: String,
    file_name: String,
}

impl CacheKey {
    /// Directory grouping all entries of one host
    pub fn host_bucket(&self) -> &str {
        &self.host_bucket
    }

    /// `{40 hex chars}.{extension}`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or(DEFAULT_EXTENSION)
    }

    /// `host_bucket/file_name`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.host_bucket).join(&self.file_name)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host_bucket, self.file_name)
    }
}

/// Derive the cache key of `url` under the given query policy.
///
/// Fails with [`CacheError::InvalidUrl`] for empty or unparseable input and for
/// URLs without a host.
pub fn key_for(url: &str, policy: &QueryPolicy) -> Result<CacheKey, CacheError> {
    let parsed = parse_url(url)?;
    Ok(key_for_url(&parsed, policy))
}

/// Rebuild `url` so that it carries only the query parameters that are part
/// of its identity.
///
/// `All` leaves the URL untouched, `None` removes the query, `Only` keeps the
/// listed parameters in the order they appear in the URL.
pub fn cacheable_url(url: &str, policy: &QueryPolicy) -> Result<String, CacheError> {
    let mut parsed = parse_url(url)?;

    match policy {
        QueryPolicy::All => {}
        QueryPolicy::None => parsed.set_query(None),
        QueryPolicy::Only(_) => {
            // Raw segments are kept so their original encoding survives
            let kept = parsed
                .query()
                .unwrap_or_default()
                .split('&')
                .filter(|segment| {
                    form_urlencoded::parse(segment.as_bytes())
                        .next()
                        .is_some_and(|(name, _)| policy.includes(&name))
                })
                .collect::<Vec<_>>()
                .join("&");

            parsed.set_query((!kept.is_empty()).then_some(kept.as_str()));
        }
    }

    Ok(parsed.into())
}

pub(crate) fn parse_url(url: &str) -> Result<Url, CacheError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CacheError::InvalidUrl("empty URL".to_string()));
    }

    let parsed = Url::parse(trimmed)?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(CacheError::InvalidUrl(format!("URL has no host: {trimmed}")));
    }

    Ok(parsed)
}

/// Key derivation for an already parsed URL.
pub(crate) fn key_for_url(url: &Url, policy: &QueryPolicy) -> CacheKey {
    let path = url.path();
    let (dir, file) = match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    };

    let extension = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    let mut hasher = Sha1::new();
    hasher.update(dir);
    hasher.update(file);
    hasher.update(&extension);
    hasher.update(serialize_query(url, policy));

    CacheKey {
        host_bucket: host_bucket(url),
        file_name: format!("{}.{extension}", hex::encode(hasher.finalize())),
    }
}

fn host_bucket(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };

    let sanitized: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{sanitized}_{}", hex::encode(Sha1::digest(host.as_bytes())))
}

// Sorted so that parameter order in the URL never changes the key.
fn serialize_query(url: &Url, policy: &QueryPolicy) -> String {
    if *policy == QueryPolicy::None {
        return String::new();
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| policy.includes(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
