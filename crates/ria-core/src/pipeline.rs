//! End-to-end report analysis
//!
//! `bytes → store → digest → cached-or-extracted text → engine → report`
//!
//! [`ReportPipeline::from_config`] wires every collaborator from one
//! [`Config`]; [`ReportPipeline::new`] takes them ready-made.

use crate::aggregate::AnalysisReport;
use crate::capability::{AnalysisCapability, ChatCompletionsClient, ChatNormalizer, TextNormalizer};
use crate::config::{CacheBackend, Config, NormalizationMode};
use crate::dedup::{ExtractionDeduplicator, TextSource};
use crate::engine::OrchestrationEngine;
use crate::error::{ConfigError, Result};
use crate::normalize::RateTableNormalizer;
use ria_cache::{CacheStore, FsCacheStore, MemoryCacheStore};
use ria_content::ContentDigest;
use ria_extraction::{
    ExtractionBackend, ExtractionGateway, FsObjectStore, HttpExtractionBackend, LocalTextBackend,
    MemoryObjectStore, ObjectLocator, ObjectStore,
};
use std::sync::Arc;
use tracing::Instrument;

/// Result of one analysis request
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    /// Digest of the uploaded bytes
    pub digest: ContentDigest,
    /// Where the stored upload lives
    pub locator: ObjectLocator,
    /// Whether the text came from the cache
    pub text_source: TextSource,
    /// Merged analysis
    pub report: AnalysisReport,
}

/// Storage, deduplicated extraction and orchestration in one call
pub struct ReportPipeline {
    objects: Arc<dyn ObjectStore>,
    dedup: ExtractionDeduplicator,
    engine: OrchestrationEngine,
}

impl std::fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("dedup", &self.dedup)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl ReportPipeline {
    /// Assemble pipeline from ready-made parts
    #[must_use]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        dedup: ExtractionDeduplicator,
        engine: OrchestrationEngine,
    ) -> Self {
        Self {
            objects,
            dedup,
            engine,
        }
    }

    /// Build every collaborator from `config`
    ///
    /// Reads the analysis API key from the environment once.
    ///
    /// # Errors
    /// - `PipelineError::Config` if the key is missing or the HTTP client
    ///   cannot be built
    /// - `PipelineError::Graph` / `Schema` from engine construction
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.analysis.api_key()?;
        let http = reqwest::Client::builder()
            .timeout(config.analysis.request_timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let objects: Arc<dyn ObjectStore> = match &config.storage.root {
            Some(root) => Arc::new(FsObjectStore::new(root)),
            None => Arc::new(MemoryObjectStore::new()),
        };

        let cache: Arc<dyn CacheStore> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
            CacheBackend::Fs => Arc::new(FsCacheStore::new(&config.cache.dir)),
        };

        let backend: Arc<dyn ExtractionBackend> = match &config.extraction.endpoint {
            Some(endpoint) => Arc::new(HttpExtractionBackend::new(http.clone(), endpoint.clone())),
            None => Arc::new(LocalTextBackend::new(Arc::clone(&objects))),
        };
        let gateway = ExtractionGateway::new(backend)
            .with_poll_interval(config.extraction.poll_interval())
            .with_timeout(config.extraction.timeout());
        let dedup = ExtractionDeduplicator::new(cache, gateway)
            .with_single_flight(config.cache.single_flight);

        let chat = Arc::new(
            ChatCompletionsClient::new(http, api_key)
                .with_base_url(config.analysis.base_url.clone())
                .with_model(config.analysis.model.clone())
                .with_temperature(config.analysis.temperature),
        );
        let normalizer: Arc<dyn TextNormalizer> = match config.normalization.mode {
            NormalizationMode::Rates => {
                Arc::new(RateTableNormalizer::new(config.normalization.rates))
            }
            NormalizationMode::Chat => Arc::new(ChatNormalizer::new(
                Arc::clone(&chat),
                config.normalization.rates,
            )),
        };
        let capability: Arc<dyn AnalysisCapability> = chat;

        let engine = OrchestrationEngine::new(normalizer, capability)?
            .with_run_timeout(config.orchestration.run_timeout());

        Ok(Self::new(objects, dedup, engine))
    }

    /// Orchestration engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &OrchestrationEngine {
        &self.engine
    }

    /// Extraction deduplicator
    #[inline]
    #[must_use]
    pub fn dedup(&self) -> &ExtractionDeduplicator {
        &self.dedup
    }

    /// Analyze one uploaded document
    ///
    /// # Errors
    /// - `PipelineError::Storage` if the upload cannot be stored
    /// - `PipelineError::Cache` / `Extraction` while resolving its text
    /// - any engine or aggregation failure
    pub async fn analyze(&self, bytes: &[u8], filename: &str) -> Result<AnalysisOutcome> {
        let locator = self.objects.store(bytes, filename).await?;
        let digest = ContentDigest::compute(bytes);
        let span = tracing::info_span!("analyze", digest = %digest.short(), file = filename);
        self.analyze_stored(digest, locator, bytes.len())
            .instrument(span)
            .await
    }

    async fn analyze_stored(
        &self,
        digest: ContentDigest,
        locator: ObjectLocator,
        size: usize,
    ) -> Result<AnalysisOutcome> {
        tracing::info!(object = %locator, bytes = size, "upload stored");
        let resolved = self.dedup.resolve(&digest, &locator).await?;
        let report = self.engine.run(resolved.text).await?;

        Ok(AnalysisOutcome {
            digest,
            locator,
            text_source: resolved.source,
            report,
        })
    }
}
