//! Extraction backend contract
//!
//! A backend runs OCR as an asynchronous job: `submit` starts it and returns a
//! handle, `poll` reports its status and, once finished, the detected lines in
//! reading order.

use crate::error::ExtractionError;
use crate::storage::ObjectLocator;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Handle of a submitted extraction job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

impl JobHandle {
    /// Create handle from a backend job id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Backend job id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still running
    Pending,
    /// Finished; lines are final
    Succeeded,
    /// Finished with an error
    Failed,
    /// Anything else the backend reported
    Other(String),
}

impl JobStatus {
    /// Whether polling can stop
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One poll result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPoll {
    /// Current status
    pub status: JobStatus,
    /// Detected text lines, in order (populated on success)
    pub lines: Vec<String>,
    /// Backend status message, if any
    pub message: Option<String>,
}

impl JobPoll {
    /// Job still running
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            lines: Vec::new(),
            message: None,
        }
    }

    /// Job finished with lines
    #[must_use]
    pub fn succeeded(lines: Vec<String>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            lines,
            message: None,
        }
    }

    /// Job failed with a message
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            lines: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// Asynchronous OCR job backend
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Start extraction of a stored document
    async fn submit(&self, locator: &ObjectLocator) -> Result<JobHandle, ExtractionError>;

    /// Report current job status
    async fn poll(&self, job: &JobHandle) -> Result<JobPoll, ExtractionError>;

    /// Backend name, for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<B: ExtractionBackend + ?Sized> ExtractionBackend for Arc<B> {
    async fn submit(&self, locator: &ObjectLocator) -> Result<JobHandle, ExtractionError> {
        (**self).submit(locator).await
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobPoll, ExtractionError> {
        (**self).poll(job).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
