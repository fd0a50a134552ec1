//! Error types for RIA Core
//!
//! Covers every failure a report run can hit:
//! - Document storage and text extraction
//! - Cache backend failures
//! - Entry-stage normalization and leaf analysis failures
//! - Aggregate schema violations
//! - Graph declaration and run-state violations
//! - Configuration loading

use ria_cache::CacheError;
use ria_extraction::{ExtractionError, StorageError};
use std::path::PathBuf;
use std::time::Duration;

use crate::state::RunState;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Raw document could not be persisted
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    /// Text extraction failed
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Extraction cache backend failed
    #[error("cache failed: {0}")]
    Cache(#[from] CacheError),

    /// Entry stage could not normalize the input text
    #[error("normalization failed: {source}")]
    Normalization {
        /// Underlying capability failure
        #[source]
        source: CapabilityError,
    },

    /// A task ran without its required input
    #[error("task {task} requires non-empty {field}")]
    TaskPrecondition {
        /// Task name
        task: &'static str,
        /// Missing state field
        field: &'static str,
    },

    /// A task's analysis capability failed
    #[error("task {task} failed: {source}")]
    AnalysisCapability {
        /// Task name
        task: &'static str,
        /// Underlying capability failure
        #[source]
        source: CapabilityError,
    },

    /// Aggregate failed schema validation
    #[error("schema validation failed: {0}")]
    Schema(#[from] SchemaError),

    /// Run exceeded its deadline
    #[error("run timed out after {}s", .waited.as_secs())]
    Timeout {
        /// Configured deadline
        waited: Duration,
    },

    /// A leaf task panicked or was aborted
    #[error("task aborted: {0}")]
    TaskAborted(String),

    /// Graph declaration rejected
    #[error("invalid task graph: {0}")]
    Graph(#[from] GraphError),

    /// Run state bookkeeping rejected a write or transition
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Error classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) => ErrorKind::Storage,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Cache(_) => ErrorKind::Cache,
            Self::Normalization { .. } => ErrorKind::Normalization,
            Self::TaskPrecondition { .. } => ErrorKind::TaskPrecondition,
            Self::AnalysisCapability { .. } => ErrorKind::AnalysisCapability,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::TaskAborted(_) => ErrorKind::Cancelled,
            Self::Graph(_) | Self::State(_) => ErrorKind::Internal,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Status code a boundary layer should report
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

/// Classification of pipeline failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Object storage
    Storage,
    /// OCR backend
    Extraction,
    /// Extraction cache
    Cache,
    /// Entry stage
    Normalization,
    /// Task input missing
    TaskPrecondition,
    /// Task capability
    AnalysisCapability,
    /// Aggregate validation
    Schema,
    /// Run deadline
    Timeout,
    /// Leaf panicked or aborted
    Cancelled,
    /// Invariant violated inside the engine
    Internal,
    /// Configuration
    Config,
}

impl ErrorKind {
    /// HTTP-style status class for this kind
    ///
    /// Storage maps to 503 and extraction to 502; everything raised inside
    /// the graph or the engine maps to 500.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Storage => 503,
            Self::Extraction => 502,
            Self::Cache
            | Self::Normalization
            | Self::TaskPrecondition
            | Self::AnalysisCapability
            | Self::Schema
            | Self::Timeout
            | Self::Cancelled
            | Self::Internal
            | Self::Config => 500,
        }
    }
}

/// Analysis / normalization capability errors
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Response carried no usable content
    #[error("empty response")]
    EmptyResponse,

    /// Response content was not the JSON the task expects
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Capability-specific failure
    #[error("{0}")]
    Other(String),
}

/// Aggregate validation errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Fragments missing from the final state
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// Fragments present but not matching the report schema
    #[error("schema violations: {}", .0.join("; "))]
    Violations(Vec<String>),

    /// Report schema itself could not be built
    #[error("invalid report schema: {0}")]
    InvalidSchema(String),
}

/// Task graph declaration errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Graph declares no entry node
    #[error("no entry node declared")]
    NoEntry,

    /// Graph declares more than one entry node
    #[error("multiple entry nodes: {0:?}")]
    MultipleEntries(Vec<&'static str>),

    /// Two nodes share a name
    #[error("duplicate node: {0}")]
    DuplicateNode(&'static str),

    /// A leaf depends on something other than the entry node
    #[error("node {node} depends on {dependency}, expected the entry node")]
    InvalidDependency {
        /// Dependent node
        node: &'static str,
        /// Declared dependency
        dependency: &'static str,
    },

    /// Graph has no leaves to run
    #[error("graph has no leaf tasks")]
    NoLeaves,

    /// A leaf names no registered task
    #[error("leaf {0} has no registered task")]
    UnknownTask(&'static str),
}

/// Run state bookkeeping errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Transition not allowed from the current state
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },

    /// Slot already holds a value
    #[error("field {0} already written")]
    AlreadyWritten(&'static str),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field path
        field: &'static str,
        /// What is wrong
        reason: String,
    },

    /// Required secret missing from the environment
    #[error("environment variable {0} is not set")]
    MissingSecret(String),

    /// Shared HTTP client could not be built
    #[error("http client: {0}")]
    HttpClient(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_and_extraction_have_distinct_status() {
        let storage: PipelineError = StorageError::NotFound("uploads/x".into()).into();
        let extraction: PipelineError = ExtractionError::NoText {
            job_id: "job-1".into(),
        }
        .into();

        assert_eq!(storage.kind(), ErrorKind::Storage);
        assert_eq!(storage.status_code(), 503);
        assert_eq!(extraction.kind(), ErrorKind::Extraction);
        assert_eq!(extraction.status_code(), 502);
    }

    #[test]
    fn graph_internal_errors_are_500() {
        let errors = [
            PipelineError::TaskPrecondition {
                task: "risk_percentage",
                field: "converted_text",
            },
            PipelineError::AnalysisCapability {
                task: "current_insurance",
                source: CapabilityError::EmptyResponse,
            },
            PipelineError::Schema(SchemaError::MissingFields(vec!["risk_percentage_s"])),
            PipelineError::Timeout {
                waited: Duration::from_secs(30),
            },
            PipelineError::TaskAborted("panicked".into()),
        ];

        for err in errors {
            assert_eq!(err.status_code(), 500, "{err}");
        }
    }

    #[test]
    fn precondition_display_names_task_and_field() {
        let err = PipelineError::TaskPrecondition {
            task: "multi_currency_risk",
            field: "converted_text",
        };
        assert_eq!(
            err.to_string(),
            "task multi_currency_risk requires non-empty converted_text"
        );
    }

    #[test]
    fn missing_fields_display_lists_keys() {
        let err = SchemaError::MissingFields(vec!["risk_percentage_s", "current_insurance_s"]);
        assert_eq!(
            err.to_string(),
            "missing fields: risk_percentage_s, current_insurance_s"
        );
    }
}
