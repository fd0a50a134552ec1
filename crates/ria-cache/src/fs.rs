//! File-backed extraction cache
//!
//! One UTF-8 file per digest, named `<digest>.txt`, under a root directory.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never sees a half-written entry.

use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;
use async_trait::async_trait;
use ria_content::ContentDigest;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const ENTRY_EXTENSION: &str = "txt";

/// Extraction cache persisted to a directory
#[derive(Debug)]
pub struct FsCacheStore {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl FsCacheStore {
    /// Create store rooted at `root`; the directory is created on first write
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_seq: AtomicU64::new(0),
        }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, digest: &ContentDigest) -> PathBuf {
        self.root.join(format!("{digest}.{ENTRY_EXTENSION}"))
    }

    fn tmp_path(&self, digest: &ContentDigest) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{digest}.{}.{seq}.tmp", std::process::id()))
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn exists(&self, digest: &ContentDigest) -> CacheResult<bool> {
        let path = self.entry_path(digest);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| CacheError::io_error("stat", path, e))
    }

    async fn get(&self, digest: &ContentDigest) -> CacheResult<Option<String>> {
        let path = self.entry_path(digest);
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| CacheError::CorruptEntry {
                    digest: *digest,
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io_error("read", path, e)),
        }
    }

    async fn put(&self, digest: &ContentDigest, text: &str) -> CacheResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::io_error("create", &self.root, e))?;

        let tmp = self.tmp_path(digest);
        tokio::fs::write(&tmp, text.as_bytes())
            .await
            .map_err(|e| CacheError::io_error("write", &tmp, e))?;

        let path = self.entry_path(digest);
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io_error("rename", path, e));
        }

        tracing::debug!(digest = %digest.short(), path = %path.display(), "cached extracted text");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_root_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path().join("not-created-yet"));
        let digest = ContentDigest::compute(b"doc");

        assert!(!store.exists(&digest).await.unwrap());
        assert_eq!(store.get(&digest).await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path());
        let digest = ContentDigest::compute(b"doc");

        store.put(&digest, "Stadium revenue €8.5m").await.unwrap();

        assert!(store.exists(&digest).await.unwrap());
        assert_eq!(
            store.get(&digest).await.unwrap().as_deref(),
            Some("Stadium revenue €8.5m")
        );
    }

    #[tokio::test]
    async fn entries_survive_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let digest = ContentDigest::compute(b"doc");

        FsCacheStore::new(dir.path()).put(&digest, "persisted").await.unwrap();

        let reopened = FsCacheStore::new(dir.path());
        assert_eq!(reopened.get(&digest).await.unwrap().as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn no_temporary_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path());
        let digest = ContentDigest::compute(b"doc");

        store.put(&digest, "a").await.unwrap();
        store.put(&digest, "b").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{digest}.txt")]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path());
        let digest = ContentDigest::compute(b"doc");

        std::fs::write(dir.path().join(format!("{digest}.txt")), [0xff, 0xfe]).unwrap();

        assert!(matches!(
            store.get(&digest).await,
            Err(CacheError::CorruptEntry { .. })
        ));
    }
}
