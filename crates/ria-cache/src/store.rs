//! Cache store contract and the in-memory store
//!
//! The store maps a [`ContentDigest`] to the text previously extracted from
//! the document with that digest. Entries are never evicted.

use crate::error::CacheResult;
use async_trait::async_trait;
use moka::future::Cache;
use ria_content::ContentDigest;
use std::sync::Arc;

/// Key-value store of extracted text, addressed by content digest
///
/// `put` on an existing digest overwrites (last writer wins). Concurrent
/// callers that both miss will both write; wrap the store in a
/// [`FlightGroup`](crate::FlightGroup) to collapse them.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Existence probe that does not transfer the stored text
    async fn exists(&self, digest: &ContentDigest) -> CacheResult<bool>;

    /// Stored text, or `None` on a miss
    async fn get(&self, digest: &ContentDigest) -> CacheResult<Option<String>>;

    /// Store text under a digest
    async fn put(&self, digest: &ContentDigest, text: &str) -> CacheResult<()>;

    /// Backend name, for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    async fn exists(&self, digest: &ContentDigest) -> CacheResult<bool> {
        (**self).exists(digest).await
    }

    async fn get(&self, digest: &ContentDigest) -> CacheResult<Option<String>> {
        (**self).get(digest).await
    }

    async fn put(&self, digest: &ContentDigest, text: &str) -> CacheResult<()> {
        (**self).put(digest, text).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// In-process extraction cache using moka
///
/// Unbounded: no capacity limit and no TTL, so an entry lives as long as the
/// store does.
#[derive(Debug, Clone)]
pub struct MemoryCacheStore {
    inner: Cache<ContentDigest, Arc<str>>,
}

impl MemoryCacheStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().build(),
        }
    }

    /// Get cache statistics
    ///
    /// Flushes moka's pending maintenance first so the count is exact.
    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn exists(&self, digest: &ContentDigest) -> CacheResult<bool> {
        Ok(self.inner.contains_key(digest))
    }

    async fn get(&self, digest: &ContentDigest) -> CacheResult<Option<String>> {
        Ok(self.inner.get(digest).await.map(|text| text.to_string()))
    }

    async fn put(&self, digest: &ContentDigest, text: &str) -> CacheResult<()> {
        self.inner.insert(*digest, Arc::from(text)).await;
        tracing::debug!(digest = %digest.short(), bytes = text.len(), "cached extracted text");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_is_not_an_error() {
        let store = MemoryCacheStore::new();
        let digest = ContentDigest::compute(b"missing");

        assert!(!store.exists(&digest).await.unwrap());
        assert_eq!(store.get(&digest).await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_then_get_returns_identical_text() {
        let store = MemoryCacheStore::new();
        let digest = ContentDigest::compute(b"report");

        store.put(&digest, "line one\nline two").await.unwrap();

        assert!(store.exists(&digest).await.unwrap());
        assert_eq!(
            store.get(&digest).await.unwrap().as_deref(),
            Some("line one\nline two")
        );
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let store = MemoryCacheStore::new();
        let digest = ContentDigest::compute(b"report");

        store.put(&digest, "first").await.unwrap();
        store.put(&digest, "second").await.unwrap();

        assert_eq!(store.get(&digest).await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.stats().await.entry_count, 1);
    }

    #[tokio::test]
    async fn stats_count_distinct_digests() {
        let store = MemoryCacheStore::default();

        for i in 0..5 {
            let digest = ContentDigest::compute(format!("doc {i}").as_bytes());
            store.put(&digest, "text").await.unwrap();
        }

        assert_eq!(store.stats().await.entry_count, 5);
    }

    #[tokio::test]
    async fn arc_store_delegates() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let digest = ContentDigest::compute(b"shared");

        store.put(&digest, "text").await.unwrap();

        assert!(store.exists(&digest).await.unwrap());
        assert_eq!(store.name(), "memory");
    }
}
