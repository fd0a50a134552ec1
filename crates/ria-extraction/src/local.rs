//! Offline extraction backend for plain-text documents
//!
//! Reads the stored object as UTF-8 and reports each non-blank line as a
//! detected line. Jobs complete on their first poll. Useful for local runs and
//! for documents that were already converted to text upstream.

use crate::backend::{ExtractionBackend, JobHandle, JobPoll};
use crate::error::ExtractionError;
use crate::storage::{ObjectLocator, ObjectStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Extraction backend reading text objects straight from an [`ObjectStore`]
pub struct LocalTextBackend {
    store: Arc<dyn ObjectStore>,
    jobs: DashMap<String, ObjectLocator>,
}

impl LocalTextBackend {
    /// Create backend reading from `store`
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            jobs: DashMap::new(),
        }
    }
}

impl std::fmt::Debug for LocalTextBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTextBackend")
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ExtractionBackend for LocalTextBackend {
    async fn submit(&self, locator: &ObjectLocator) -> Result<JobHandle, ExtractionError> {
        let id = Uuid::new_v4().to_string();
        self.jobs.insert(id.clone(), locator.clone());
        Ok(JobHandle::new(id))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobPoll, ExtractionError> {
        let (_, locator) = self
            .jobs
            .remove(job.id())
            .ok_or_else(|| ExtractionError::UnknownJob(job.id().to_string()))?;

        let bytes = self.store.load(&locator).await?;
        let Ok(text) = String::from_utf8(bytes) else {
            return Ok(JobPoll::failed(format!("{locator} is not UTF-8 text")));
        };

        let lines = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        Ok(JobPoll::succeeded(lines))
    }

    fn name(&self) -> &'static str {
        "local-text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JobStatus;
    use crate::storage::MemoryObjectStore;

    #[tokio::test]
    async fn reports_non_blank_lines() {
        let store = Arc::new(MemoryObjectStore::new());
        let locator = store
            .store("Header\n\n  \nStadium revenue €8.5m per fixture.  \n".as_bytes(), "r.txt")
            .await
            .unwrap();
        let backend = LocalTextBackend::new(store);

        let job = backend.submit(&locator).await.unwrap();
        let poll = backend.poll(&job).await.unwrap();

        assert_eq!(poll.status, JobStatus::Succeeded);
        assert_eq!(poll.lines, vec!["Header", "Stadium revenue €8.5m per fixture."]);
    }

    #[tokio::test]
    async fn binary_document_fails_job() {
        let store = Arc::new(MemoryObjectStore::new());
        let locator = store.store(&[0xff, 0x00, 0xfe], "scan.pdf").await.unwrap();
        let backend = LocalTextBackend::new(store);

        let job = backend.submit(&locator).await.unwrap();
        let poll = backend.poll(&job).await.unwrap();

        assert_eq!(poll.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let backend = LocalTextBackend::new(Arc::new(MemoryObjectStore::new()));
        let result = backend.poll(&JobHandle::new("nope")).await;
        assert!(matches!(result, Err(ExtractionError::UnknownJob(_))));
    }
}
