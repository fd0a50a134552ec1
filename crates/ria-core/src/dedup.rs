//! Content-addressed extraction deduplication
//!
//! ```text
//! digest → exists? ─ yes → get ──────────────────────────────┐
//!            │                 └ vanished ┐                  │
//!            no ←─────────────────────────┘                  │
//!            │                                               │
//!      enter flight(digest) → re-check cache ─ hit ──────────┤
//!            │                                               │
//!           miss → gateway.extract(locator) → put ───────────┴→ text
//! ```
//!
//! Callers with the same digest queue on one flight, so concurrent uploads
//! of identical bytes run a single extraction; followers find the text in
//! the cache once the leader has written it.

use crate::error::Result;
use ria_cache::{CacheStore, FlightGroup};
use ria_content::ContentDigest;
use ria_extraction::{ExtractionGateway, ObjectLocator};
use std::sync::Arc;

/// Where resolved text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// Earlier extraction, read from the cache
    Cache,
    /// Fresh extraction by this call
    Extraction,
}

/// Text resolved for a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    /// Extracted text
    pub text: String,
    /// Origin of the text
    pub source: TextSource,
}

/// Cache-first front of the extraction gateway
pub struct ExtractionDeduplicator {
    cache: Arc<dyn CacheStore>,
    gateway: ExtractionGateway,
    flights: FlightGroup<ContentDigest>,
    single_flight: bool,
}

impl std::fmt::Debug for ExtractionDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionDeduplicator")
            .field("cache", &self.cache.name())
            .field("gateway", &self.gateway)
            .field("single_flight", &self.single_flight)
            .finish_non_exhaustive()
    }
}

impl ExtractionDeduplicator {
    /// Create deduplicator with single-flight enabled
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, gateway: ExtractionGateway) -> Self {
        Self {
            cache,
            gateway,
            flights: FlightGroup::new(),
            single_flight: true,
        }
    }

    /// Enable or disable per-digest single-flight
    #[inline]
    #[must_use]
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Underlying cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Resolve the text for `digest`, extracting from `locator` on a miss
    ///
    /// # Errors
    /// - `PipelineError::Cache` if the cache backend fails
    /// - `PipelineError::Extraction` if extraction fails; nothing is cached
    pub async fn resolve(
        &self,
        digest: &ContentDigest,
        locator: &ObjectLocator,
    ) -> Result<ResolvedText> {
        if let Some(text) = self.lookup(digest).await? {
            return Ok(ResolvedText {
                text,
                source: TextSource::Cache,
            });
        }

        let _flight = if self.single_flight {
            let flight = self.flights.enter(*digest).await;
            if let Some(text) = self.lookup(digest).await? {
                tracing::debug!(digest = %digest.short(), "filled by concurrent extraction");
                return Ok(ResolvedText {
                    text,
                    source: TextSource::Cache,
                });
            }
            Some(flight)
        } else {
            None
        };

        tracing::info!(digest = %digest.short(), object = %locator, "cache miss, extracting");
        let text = self.gateway.extract(locator).await?;
        self.cache.put(digest, &text).await?;

        Ok(ResolvedText {
            text,
            source: TextSource::Extraction,
        })
    }

    async fn lookup(&self, digest: &ContentDigest) -> Result<Option<String>> {
        if !self.cache.exists(digest).await? {
            tracing::debug!(digest = %digest.short(), cache = self.cache.name(), "cache miss");
            return Ok(None);
        }

        match self.cache.get(digest).await? {
            Some(text) => {
                tracing::debug!(digest = %digest.short(), cache = self.cache.name(), "cache hit");
                Ok(Some(text))
            }
            None => {
                tracing::warn!(
                    digest = %digest.short(),
                    "cache entry vanished between exists and get"
                );
                Ok(None)
            }
        }
    }
}
