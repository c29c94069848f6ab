//! # File Store
//!
//! Durable on-disk storage of cached resources. Presence of an entry is
//! determined purely by file existence; there is no index or metadata file.
//!
//! Entries are written to a hidden temp file in the target directory and
//! renamed into place, so a reader never observes a partially written entry.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};
use tracing::{debug, warn};

use crate::cache::key::CacheKey;
use crate::error::CacheError;

const TEMP_SUFFIX: &str = ".tmp";

/// Totals for the completed entries under the cache root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheInfo {
    /// Number of cached files
    pub files: u64,
    /// Total size of cached files in bytes
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of an entry
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.host_bucket()).join(key.file_name())
    }

    /// Path of the entry if it has been materialized
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<PathBuf>, CacheError> {
        let path = self.path_for(key);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            // A file squatting on the bucket path means the entry cannot exist
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ) =>
            {
                Ok(None)
            }
            Err(e) => Err(CacheError::storage(path, e)),
        }
    }

    /// Stream `body` into the entry for `key`.
    ///
    /// On failure the temp file is removed and nothing exists at the final path.
    pub async fn write_stream<S>(&self, key: &CacheKey, body: S) -> Result<PathBuf, CacheError>
    where
        S: Stream<Item = Result<Bytes, CacheError>> + Send,
    {
        let path = self.path_for(key);
        let temp_path = self.prepare_temp_path(key).await?;

        match write_temp(&temp_path, body).await {
            Ok(size) => {
                self.commit(&temp_path, &path).await?;
                debug!(key = %key, size, "Stored cache entry");
                Ok(path)
            }
            Err(e) => {
                discard(&temp_path).await;
                Err(e)
            }
        }
    }

    /// Copy a local file into the entry for `key`.
    pub async fn seed(&self, key: &CacheKey, source: &Path) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key);
        let temp_path = self.prepare_temp_path(key).await?;

        if let Err(e) = fs::copy(source, &temp_path).await {
            discard(&temp_path).await;
            return Err(CacheError::storage(source, e));
        }

        self.commit(&temp_path, &path).await?;
        debug!(key = %key, source = %source.display(), "Seeded cache entry");
        Ok(path)
    }

    /// Remove an entry. A missing entry is not an error.
    pub async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to remove cache entry");
                Err(CacheError::storage(path, e))
            }
        }
    }

    /// Remove every host bucket under the root
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CacheError::storage(&self.root, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::storage(&self.root, e))?
        {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to remove cache path");
                    return Err(CacheError::storage(path, e));
                }
            }
        }

        debug!(count = removed, "Cleared cache");
        Ok(())
    }

    /// Count completed entries and their total size. Temp files are skipped.
    pub async fn info(&self) -> Result<CacheInfo, CacheError> {
        let mut info = CacheInfo::default();
        for bucket in self.buckets().await? {
            let mut entries = fs::read_dir(&bucket)
                .await
                .map_err(|e| CacheError::storage(&bucket, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CacheError::storage(&bucket, e))?
            {
                if is_temp_file(&entry.path()) {
                    continue;
                }
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| CacheError::storage(entry.path(), e))?;
                if meta.is_file() {
                    info.files += 1;
                    info.size += meta.len();
                }
            }
        }
        Ok(info)
    }

    /// Delete temp files left behind by an interrupted process.
    ///
    /// Must not run while downloads are in flight in this or another process
    /// sharing the same root.
    pub async fn sweep_temp_files(&self) -> Result<usize, CacheError> {
        let mut swept = 0;
        for bucket in self.buckets().await? {
            let mut entries = fs::read_dir(&bucket)
                .await
                .map_err(|e| CacheError::storage(&bucket, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CacheError::storage(&bucket, e))?
            {
                let path = entry.path();
                if !is_temp_file(&path) {
                    continue;
                }
                match fs::remove_file(&path).await {
                    Ok(()) => swept += 1,
                    Err(e) => warn!(path = ?path, error = %e, "Failed to remove stale temp file"),
                }
            }
        }

        if swept > 0 {
            debug!(count = swept, "Removed stale temp files");
        }
        Ok(swept)
    }

    async fn buckets(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::storage(&self.root, e)),
        };

        let mut buckets = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::storage(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                buckets.push(entry.path());
            }
        }
        Ok(buckets)
    }

    /// Ensure the bucket directory exists and pick a unique temp name inside it
    async fn prepare_temp_path(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        let dir = self.root.join(key.host_bucket());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::storage(&dir, e))?;

        let nonce: u64 = rand::random();
        Ok(dir.join(format!(".{}.{nonce:016x}{TEMP_SUFFIX}", key.file_name())))
    }

    async fn commit(&self, temp_path: &Path, path: &Path) -> Result<(), CacheError> {
        if let Err(e) = fs::rename(temp_path, path).await {
            warn!(
                from = ?temp_path,
                to = ?path,
                error = %e,
                "Failed to rename temporary cache file"
            );
            discard(temp_path).await;
            return Err(CacheError::storage(path, e));
        }
        Ok(())
    }
}

async fn write_temp<S>(temp_path: &Path, body: S) -> Result<u64, CacheError>
where
    S: Stream<Item = Result<Bytes, CacheError>> + Send,
{
    let storage_err = |e| CacheError::storage(temp_path, e);

    let mut file = fs::File::create(temp_path).await.map_err(storage_err)?;
    let mut written = 0u64;

    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(storage_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(storage_err)?;
    file.sync_all().await.map_err(storage_err)?;
    Ok(written)
}

async fn discard(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = ?temp_path, error = %e, "Failed to remove temporary cache file");
        }
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{QueryPolicy, key_for};
    use futures::stream;
    use tempfile::TempDir;

    fn key(url: &str) -> CacheKey {
        key_for(url, &QueryPolicy::None).unwrap()
    }

    fn ok_body(chunks: &[&'static str]) -> impl Stream<Item = Result<Bytes, CacheError>> + Send {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut entries) = fs::read_dir(dir).await else {
            return names;
        };
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names
    }

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let k = key("https://example.com/a.png");

        assert!(store.lookup(&k).await.unwrap().is_none());

        let path = store.write_stream(&k, ok_body(&["hello ", "world"])).await.unwrap();
        assert_eq!(path, tmp.path().join(k.relative_path()));
        assert_eq!(store.lookup(&k).await.unwrap(), Some(path.clone()));
        assert_eq!(fs::read(&path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let k = key("https://example.com/broken.png");

        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(CacheError::Stream("connection reset".to_string())),
        ]);
        let err = store.write_stream(&k, body).await.unwrap_err();
        assert!(err.is_fetch_error());

        assert!(store.lookup(&k).await.unwrap().is_none());
        let bucket = tmp.path().join(k.host_bucket());
        assert!(dir_entries(&bucket).await.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_bucket_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let k = key("https://example.com/blocked.png");

        // A regular file where the bucket directory should go
        fs::write(tmp.path().join(k.host_bucket()), b"not a dir")
            .await
            .unwrap();

        assert!(store.lookup(&k).await.unwrap().is_none());
        let err = store.write_stream(&k, ok_body(&["data"])).await.unwrap_err();
        assert!(err.is_storage_error());
        assert!(matches!(&err, CacheError::Storage { path, .. } if path.ends_with(k.host_bucket())));
    }

    #[tokio::test]
    async fn test_seed_and_remove() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("cache"));
        let source = tmp.path().join("local.png");
        fs::write(&source, b"seeded").await.unwrap();

        let k = key("https://example.com/seeded.png");
        let path = store.seed(&k, &source).await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"seeded");

        store.remove(&k).await.unwrap();
        assert!(store.lookup(&k).await.unwrap().is_none());
        // Removing twice is fine
        store.remove(&k).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_missing_source() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let k = key("https://example.com/seeded.png");

        let err = store
            .seed(&k, &tmp.path().join("does-not-exist"))
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
        assert!(dir_entries(&tmp.path().join(k.host_bucket())).await.is_empty());
    }

    #[tokio::test]
    async fn test_info_sweep_and_clear() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        assert_eq!(store.info().await.unwrap(), CacheInfo::default());

        store
            .write_stream(&key("https://a.example.com/1.png"), ok_body(&["abc"]))
            .await
            .unwrap();
        store
            .write_stream(&key("https://b.example.com/2.png"), ok_body(&["defgh"]))
            .await
            .unwrap();

        let orphan_key = key("https://a.example.com/orphan.png");
        let orphan = store.prepare_temp_path(&orphan_key).await.unwrap();
        fs::write(&orphan, b"leftover").await.unwrap();

        let info = store.info().await.unwrap();
        assert_eq!(info, CacheInfo { files: 2, size: 8 });

        assert_eq!(store.sweep_temp_files().await.unwrap(), 1);
        assert!(!fs::try_exists(&orphan).await.unwrap());
        assert_eq!(store.info().await.unwrap().files, 2);

        store.clear().await.unwrap();
        assert_eq!(store.info().await.unwrap(), CacheInfo::default());
        assert!(dir_entries(tmp.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_missing_root() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("never-created"));
        store.clear().await.unwrap();
        assert_eq!(store.sweep_temp_files().await.unwrap(), 0);
    }
}
