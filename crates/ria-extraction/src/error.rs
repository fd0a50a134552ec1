//! Error types for document storage and text extraction

use std::path::PathBuf;
use std::time::Duration;

/// Errors while persisting or loading raw documents
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filename cannot be used in an object key
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    /// Object not present in the store
    #[error("object not found: {0}")]
    NotFound(String),

    /// IO error against a file-backed store
    #[error("io error during {op} of {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Errors while running an extraction job
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Backend rejected the submission
    #[error("job submission failed: {0}")]
    SubmitFailed(String),

    /// Polling the job failed at transport level
    #[error("job {job_id} poll failed: {message}")]
    PollFailed { job_id: String, message: String },

    /// Backend reported the job as failed
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// Backend reported a status the gateway does not understand
    #[error("job {job_id} reported unexpected status {status:?}")]
    UnexpectedStatus { job_id: String, status: String },

    /// Job succeeded but produced no text lines
    #[error("job {job_id} produced no text")]
    NoText { job_id: String },

    /// Poll loop gave up before a terminal status was observed
    #[error("job {job_id} did not finish within {}s", .waited.as_secs())]
    Timeout { job_id: String, waited: Duration },

    /// Job was unknown to the backend
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// Loading the document for extraction failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ExtractionError {
    /// Create a poll failure for a job
    pub fn poll_failed(job_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::PollFailed {
            job_id: job_id.into(),
            message: message.to_string(),
        }
    }
}
