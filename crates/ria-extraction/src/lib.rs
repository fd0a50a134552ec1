//! RIA Extraction
//!
//! Everything between an uploaded document and its plain text:
//!
//! - [`ObjectStore`]: persists raw bytes, hands out [`ObjectLocator`]s
//! - [`ExtractionBackend`]: asynchronous OCR job protocol (submit / poll)
//! - [`ExtractionGateway`]: one awaitable `extract(locator) -> text` call with
//!   a fixed poll interval and an overall deadline
//!
//! # Example
//!
//! ```rust,ignore
//! use ria_extraction::{ExtractionGateway, LocalTextBackend, MemoryObjectStore, ObjectStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryObjectStore::new());
//! let locator = store.store(b"Stadium revenue", "report.txt").await?;
//! let gateway = ExtractionGateway::new(Arc::new(LocalTextBackend::new(store)));
//! let text = gateway.extract(&locator).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod error;
pub mod gateway;
pub mod http;
pub mod local;
pub mod storage;

pub use backend::{ExtractionBackend, JobHandle, JobPoll, JobStatus};
pub use error::{ExtractionError, StorageError};
pub use gateway::{ExtractionGateway, DEFAULT_EXTRACTION_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use http::{HttpExtractionBackend, MAX_RESULT_PAGES};
pub use local::LocalTextBackend;
pub use storage::{upload_key, FsObjectStore, MemoryObjectStore, ObjectLocator, ObjectStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
