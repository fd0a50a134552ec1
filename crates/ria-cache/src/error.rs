//! Error types for the extraction cache
//!
//! A cache miss is never an error; these cover failures of the backing
//! store itself.

use ria_content::ContentDigest;
use std::path::PathBuf;

/// Errors during cache reads and writes
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error against a file-backed store
    #[error("io error during {op} of {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored entry could not be decoded
    #[error("corrupt cache entry {digest}: {reason}")]
    CorruptEntry {
        digest: ContentDigest,
        reason: String,
    },

    /// Backend-specific failure (remote key-value stores)
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    /// Create IO error for path
    pub fn io_error(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
