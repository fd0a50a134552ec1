//! Blocking extraction gateway
//!
//! Turns the submit/poll job protocol into one awaitable call: submit, poll at
//! a fixed interval until a terminal status, join the lines with `\n`. The
//! whole loop runs under a deadline; dropping the returned future stops
//! polling.

use crate::backend::{ExtractionBackend, JobHandle, JobStatus};
use crate::error::ExtractionError;
use crate::storage::ObjectLocator;
use std::sync::Arc;
use std::time::Duration;

/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default overall deadline for one extraction
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Submit-and-wait wrapper around an [`ExtractionBackend`]
#[derive(Clone)]
pub struct ExtractionGateway {
    backend: Arc<dyn ExtractionBackend>,
    poll_interval: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for ExtractionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionGateway")
            .field("backend", &self.backend.name())
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ExtractionGateway {
    /// Create gateway with default interval and deadline
    #[must_use]
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self {
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// With overall deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Extract the text of a stored document
    ///
    /// # Errors
    /// - `ExtractionError::SubmitFailed` / `PollFailed` on backend transport errors
    /// - `ExtractionError::JobFailed` if the job reports failure
    /// - `ExtractionError::UnexpectedStatus` for non-standard terminal statuses
    /// - `ExtractionError::NoText` if the job succeeded without any lines
    /// - `ExtractionError::Timeout` if no terminal status arrives in time
    pub async fn extract(&self, locator: &ObjectLocator) -> Result<String, ExtractionError> {
        let job = self.backend.submit(locator).await?;
        tracing::info!(
            backend = self.backend.name(),
            job = %job,
            object = %locator,
            "extraction job submitted"
        );

        match tokio::time::timeout(self.timeout, self.wait_for(&job)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    job = %job,
                    waited_secs = self.timeout.as_secs(),
                    "extraction job timed out"
                );
                Err(ExtractionError::Timeout {
                    job_id: job.0,
                    waited: self.timeout,
                })
            }
        }
    }

    async fn wait_for(&self, job: &JobHandle) -> Result<String, ExtractionError> {
        let mut polls = 0u32;
        loop {
            let poll = self.backend.poll(job).await?;
            polls += 1;

            match poll.status {
                JobStatus::Pending => {
                    tracing::debug!(job = %job, polls, "extraction job pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                JobStatus::Succeeded => {
                    if poll.lines.is_empty() {
                        return Err(ExtractionError::NoText {
                            job_id: job.0.clone(),
                        });
                    }
                    tracing::info!(
                        job = %job,
                        polls,
                        lines = poll.lines.len(),
                        "extraction job succeeded"
                    );
                    return Ok(poll.lines.join("\n"));
                }
                JobStatus::Failed => {
                    return Err(ExtractionError::JobFailed {
                        job_id: job.0.clone(),
                        message: poll
                            .message
                            .unwrap_or_else(|| "no status message".to_string()),
                    });
                }
                JobStatus::Other(status) => {
                    return Err(ExtractionError::UnexpectedStatus {
                        job_id: job.0.clone(),
                        status,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JobPoll;
    use async_trait::async_trait;
    use fake::ScriptedBackend;

    // Small local fake; the shared fakes live in ria-test-utils.
    mod fake {
        use super::*;
        use parking_lot::Mutex;
        use std::collections::VecDeque;
        use std::sync::atomic::{AtomicUsize, Ordering};

        pub(super) struct ScriptedBackend {
            polls: Mutex<VecDeque<JobPoll>>,
            pub(super) poll_count: AtomicUsize,
        }

        impl ScriptedBackend {
            pub(super) fn new(polls: Vec<JobPoll>) -> Self {
                Self {
                    polls: Mutex::new(polls.into()),
                    poll_count: AtomicUsize::new(0),
                }
            }
        }

        #[async_trait]
        impl ExtractionBackend for ScriptedBackend {
            async fn submit(&self, _locator: &ObjectLocator) -> Result<JobHandle, ExtractionError> {
                Ok(JobHandle::new("job-1"))
            }

            async fn poll(&self, _job: &JobHandle) -> Result<JobPoll, ExtractionError> {
                self.poll_count.fetch_add(1, Ordering::SeqCst);
                let next = self.polls.lock().pop_front();
                Ok(next.unwrap_or_else(JobPoll::pending))
            }

            fn name(&self) -> &'static str {
                "scripted"
            }
        }
    }

    fn locator() -> ObjectLocator {
        ObjectLocator::new("memory", "uploads/report.pdf")
    }

    fn gateway(backend: Arc<ScriptedBackend>) -> ExtractionGateway {
        ExtractionGateway::new(backend)
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn polls_until_success_and_joins_lines() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            JobPoll::pending(),
            JobPoll::pending(),
            JobPoll::succeeded(vec!["Line one".into(), "Line two".into()]),
        ]));

        let text = gateway(Arc::clone(&backend)).extract(&locator()).await.unwrap();

        assert_eq!(text, "Line one\nLine two");
        assert_eq!(backend.poll_count.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_job_is_an_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![JobPoll::failed("bad pdf")]));

        let err = gateway(backend).extract(&locator()).await.unwrap_err();

        assert!(matches!(
            err,
            ExtractionError::JobFailed { ref message, .. } if message == "bad pdf"
        ));
    }

    #[tokio::test]
    async fn unexpected_status_is_an_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![JobPoll {
            status: JobStatus::Other("PARTIAL_SUCCESS".into()),
            lines: vec!["partial".into()],
            message: None,
        }]));

        let err = gateway(backend).extract(&locator()).await.unwrap_err();

        assert!(matches!(
            err,
            ExtractionError::UnexpectedStatus { ref status, .. } if status == "PARTIAL_SUCCESS"
        ));
    }

    #[tokio::test]
    async fn empty_success_is_no_text() {
        let backend = Arc::new(ScriptedBackend::new(vec![JobPoll::succeeded(vec![])]));

        let err = gateway(backend).extract(&locator()).await.unwrap_err();

        assert!(matches!(err, ExtractionError::NoText { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn never_finishing_job_times_out() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let gateway = ExtractionGateway::new(backend)
            .with_poll_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(30));

        let err = gateway.extract(&locator()).await.unwrap_err();

        assert!(matches!(
            err,
            ExtractionError::Timeout { waited, .. } if waited == Duration::from_secs(30)
        ));
    }
}
