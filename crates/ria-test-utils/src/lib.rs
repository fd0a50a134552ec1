//! Testing utilities for RIA workspace
//!
//! Scripted capabilities, counting extraction backends, failing stores,
//! a local HTTP stub and report fixtures.

#![allow(missing_docs)]

pub mod http_stub;

pub use http_stub::{StubRequest, StubResponse, StubServer};

use async_trait::async_trait;
use parking_lot::Mutex;
use ria_cache::{CacheError, CacheResult, CacheStore};
use ria_content::ContentDigest;
use ria_core::{AnalysisCapability, AnalysisKind, AnalysisTask, CapabilityError, TextNormalizer};
use ria_extraction::{
    ExtractionBackend, ExtractionError, JobHandle, JobPoll, ObjectLocator, ObjectStore,
    StorageError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Short report excerpt used across integration tests
pub const STADIUM_REPORT: &str = "Stadium Risk Assessment\n\
Stadium revenue €8.5m per fixture.\n\
There is a 23% probability of weather-related damage requiring emergency repairs annually.\n\
Current property limits appear insufficient when considering the full replacement timeline.";

/// Fragment a scripted capability returns for `kind` by default
#[must_use]
pub fn fragment_for(kind: AnalysisKind) -> Value {
    json!({ "task": kind.task_name() })
}

enum Script {
    Respond(Value),
    Fail(String),
}

/// Capability with per-task canned responses, failures and delays
///
/// Every invocation is recorded with the text it received.
pub struct ScriptedCapability {
    scripts: HashMap<AnalysisKind, Script>,
    delays: HashMap<AnalysisKind, Duration>,
    calls: Mutex<Vec<(AnalysisKind, String)>>,
    finished: Mutex<HashSet<AnalysisKind>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedCapability {
    /// Every task answers with [`fragment_for`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            finished: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn respond(mut self, kind: AnalysisKind, value: Value) -> Self {
        self.scripts.insert(kind, Script::Respond(value));
        self
    }

    #[must_use]
    pub fn fail(mut self, kind: AnalysisKind, message: impl Into<String>) -> Self {
        self.scripts.insert(kind, Script::Fail(message.into()));
        self
    }

    #[must_use]
    pub fn delay(mut self, kind: AnalysisKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn calls(&self) -> Vec<(AnalysisKind, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn texts_seen(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    /// Whether the invocation for `kind` ran to completion
    pub fn finished(&self, kind: AnalysisKind) -> bool {
        self.finished.lock().contains(&kind)
    }

    /// Highest number of simultaneous invocations observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedCapability {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisCapability for ScriptedCapability {
    async fn invoke(&self, task: &AnalysisTask, text: &str) -> Result<Value, CapabilityError> {
        let kind = task.kind();
        self.calls.lock().push((kind, text.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delays.get(&kind) {
            tokio::time::sleep(*delay).await;
        }

        let result = match self.scripts.get(&kind) {
            Some(Script::Respond(value)) => Ok(value.clone()),
            Some(Script::Fail(message)) => Err(CapabilityError::Other(message.clone())),
            None => Ok(fragment_for(kind)),
        };
        self.finished.lock().insert(kind);
        result
    }
}

/// Normalizer that ignores its input and returns fixed text
pub struct FixedNormalizer(pub String);

#[async_trait]
impl TextNormalizer for FixedNormalizer {
    async fn normalize(&self, _text: &str) -> Result<String, CapabilityError> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Normalizer that always fails
pub struct FailingNormalizer;

#[async_trait]
impl TextNormalizer for FailingNormalizer {
    async fn normalize(&self, _text: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Other("normalizer unavailable".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Extraction backend that counts submissions and returns fixed text
pub struct CountingBackend {
    text: String,
    submit_delay: Duration,
    submits: AtomicUsize,
}

impl CountingBackend {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            submit_delay: Duration::ZERO,
            submits: AtomicUsize::new(0),
        }
    }

    /// Hold each submission for `delay` before returning the job
    #[must_use]
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for CountingBackend {
    async fn submit(&self, _locator: &ObjectLocator) -> Result<JobHandle, ExtractionError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        Ok(JobHandle::new(format!("job-{n}")))
    }

    async fn poll(&self, _job: &JobHandle) -> Result<JobPoll, ExtractionError> {
        Ok(JobPoll::succeeded(
            self.text.lines().map(str::to_string).collect(),
        ))
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Cache whose backend is always down
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn exists(&self, _digest: &ContentDigest) -> CacheResult<bool> {
        Err(CacheError::Backend("cache unavailable".into()))
    }

    async fn get(&self, _digest: &ContentDigest) -> CacheResult<Option<String>> {
        Err(CacheError::Backend("cache unavailable".into()))
    }

    async fn put(&self, _digest: &ContentDigest, _text: &str) -> CacheResult<()> {
        Err(CacheError::Backend("cache unavailable".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Object store that rejects every upload
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn store(&self, _bytes: &[u8], filename: &str) -> Result<ObjectLocator, StorageError> {
        Err(StorageError::io_error(
            "write",
            filename,
            std::io::Error::new(std::io::ErrorKind::Other, "bucket unavailable"),
        ))
    }

    async fn load(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(locator.to_string()))
    }
}
