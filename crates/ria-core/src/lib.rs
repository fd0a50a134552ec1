//! RIA Core
//!
//! Turns an uploaded risk-assessment report into one structured analysis.
//!
//! # Architecture
//!
//! ```text
//! bytes ─→ ObjectStore ─→ ContentDigest ─→ ExtractionDeduplicator
//!                                              │  (cache / single-flight / OCR)
//!                                              ▼
//!                                       OrchestrationEngine
//!                                              │
//!                  convert_currency ──┬──→ six leaf tasks (JoinSet)
//!                                     │
//!                                     ▼
//!                               StateAggregator ─→ AnalysisReport
//! ```
//!
//! # Key Invariants
//!
//! 1. The entry node completes before any leaf starts
//! 2. Each fragment slot has exactly one writer
//! 3. A run either yields all six fragments or fails as a whole
//! 4. Identical bytes are extracted at most once per cache
//!
//! # Example
//!
//! ```rust,ignore
//! use ria_core::{Config, ReportPipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ReportPipeline::from_config(&Config::default())?;
//! let outcome = pipeline.analyze(b"Stadium revenue \xe2\x82\xac8.5m", "report.txt").await?;
//! println!("{}", serde_json::to_string_pretty(&outcome.report)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregate;
pub mod capability;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod pipeline;
pub mod state;
pub mod task;

pub use aggregate::{AnalysisReport, JsonObject, StateAggregator};
pub use capability::{AnalysisCapability, ChatCompletionsClient, ChatNormalizer, TextNormalizer};
pub use config::Config;
pub use dedup::{ExtractionDeduplicator, ResolvedText, TextSource};
pub use engine::{OrchestrationEngine, RunId};
pub use error::{
    CapabilityError, ConfigError, ErrorKind, GraphError, PipelineError, Result, SchemaError,
    StateError,
};
pub use graph::{GraphNode, TaskGraph, ENTRY_NODE};
pub use normalize::{ExchangeRates, RateTableNormalizer};
pub use pipeline::{AnalysisOutcome, ReportPipeline};
pub use state::{AnalysisKind, Fragment, GraphState, RunState};
pub use task::{AnalysisTask, TaskRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
