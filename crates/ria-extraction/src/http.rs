//! HTTP job-API extraction backend
//!
//! Talks to a document-text-detection service with a Textract-shaped JSON
//! contract:
//!
//! ```text
//! POST {endpoint}/jobs            {"DocumentLocation":{"S3Object":{"Bucket":..,"Name":..}}}
//!                              →  {"JobId":".."}
//! GET  {endpoint}/jobs/{id}[?next_token=..]
//!                              →  {"JobStatus":"IN_PROGRESS|SUCCEEDED|FAILED|..",
//!                                  "StatusMessage":..,
//!                                  "Blocks":[{"BlockType":"LINE","Text":".."}],
//!                                  "NextToken":..}
//! ```
//!
//! Only `LINE` blocks contribute text. Successful results may be paginated;
//! every page is fetched before the lines are returned.

use crate::backend::{ExtractionBackend, JobHandle, JobPoll, JobStatus};
use crate::error::ExtractionError;
use crate::storage::ObjectLocator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default upper bound on result pages followed for one job
pub const MAX_RESULT_PAGES: usize = 1_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartRequest<'a> {
    document_location: DocumentLocation<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DocumentLocation<'a> {
    s3_object: S3Object<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object<'a> {
    bucket: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectionPage {
    job_status: String,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    blocks: Vec<Block>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Block {
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

impl DetectionPage {
    fn status(&self) -> JobStatus {
        match self.job_status.as_str() {
            "IN_PROGRESS" => JobStatus::Pending,
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    fn line_texts(self) -> impl Iterator<Item = String> {
        self.blocks
            .into_iter()
            .filter(|b| b.block_type == "LINE")
            .filter_map(|b| b.text)
    }
}

/// Extraction backend speaking the JSON job API over HTTP
#[derive(Debug, Clone)]
pub struct HttpExtractionBackend {
    http: reqwest::Client,
    endpoint: String,
    max_pages: usize,
}

impl HttpExtractionBackend {
    /// Create backend for `endpoint` sharing an existing client
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            max_pages: MAX_RESULT_PAGES,
        }
    }

    /// With a cap on result pages fetched per poll
    #[inline]
    #[must_use]
    pub fn with_max_result_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_page(
        &self,
        job: &JobHandle,
        next_token: Option<&str>,
    ) -> Result<DetectionPage, ExtractionError> {
        let url = format!("{}/jobs/{}", self.endpoint, job.id());
        let mut request = self.http.get(&url);
        if let Some(token) = next_token {
            request = request.query(&[("next_token", token)]);
        }

        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExtractionError::poll_failed(job.id(), e))?
            .json::<DetectionPage>()
            .await
            .map_err(|e| ExtractionError::poll_failed(job.id(), e))
    }
}

#[async_trait]
impl ExtractionBackend for HttpExtractionBackend {
    async fn submit(&self, locator: &ObjectLocator) -> Result<JobHandle, ExtractionError> {
        let body = StartRequest {
            document_location: DocumentLocation {
                s3_object: S3Object {
                    bucket: &locator.bucket,
                    name: &locator.key,
                },
            },
        };

        let response = self
            .http
            .post(format!("{}/jobs", self.endpoint))
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExtractionError::SubmitFailed(e.to_string()))?
            .json::<StartResponse>()
            .await
            .map_err(|e| ExtractionError::SubmitFailed(e.to_string()))?;

        Ok(JobHandle::new(response.job_id))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobPoll, ExtractionError> {
        let first = self.fetch_page(job, None).await?;
        let status = first.status();
        let message = first.status_message.clone();

        if status != JobStatus::Succeeded {
            return Ok(JobPoll {
                status,
                lines: Vec::new(),
                message,
            });
        }

        let mut next_token = first.next_token.clone();
        let mut lines: Vec<String> = first.line_texts().collect();
        let mut pages = 1;

        while let Some(token) = next_token.take() {
            if pages >= self.max_pages {
                tracing::warn!(job = %job, pages, "result pagination limit reached");
                break;
            }
            let page = self.fetch_page(job, Some(&token)).await?;
            next_token = page.next_token.clone();
            lines.extend(page.line_texts());
            pages += 1;
        }

        tracing::debug!(job = %job, pages, lines = lines.len(), "fetched detection results");
        Ok(JobPoll {
            status,
            lines,
            message,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
