//! Raw document storage
//!
//! Uploaded bytes are persisted before extraction and addressed by an
//! [`ObjectLocator`]. Keys follow `uploads/<uuid>_<filename>`, so two uploads
//! of the same file get distinct objects even though they share a digest.

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Prefix for uploaded document keys
pub const UPLOAD_PREFIX: &str = "uploads";

/// Opaque reference to a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocator {
    /// Store namespace (bucket name or root directory)
    pub bucket: String,
    /// Object key within the namespace
    pub key: String,
}

impl ObjectLocator {
    /// Create locator
    #[inline]
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Build a fresh upload key for a client filename
///
/// # Errors
/// Returns [`StorageError::InvalidFilename`] for empty names or names that
/// carry path components.
pub fn upload_key(filename: &str) -> Result<String, StorageError> {
    let name = filename.trim();
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if name.is_empty() || !single_normal || name.contains('\\') {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    Ok(format!("{UPLOAD_PREFIX}/{}_{name}", Uuid::new_v4()))
}

/// Persists raw documents for the extraction backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes and return their locator
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ObjectLocator, StorageError>;

    /// Load previously stored bytes
    async fn load(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ObjectLocator, StorageError> {
        (**self).store(bytes, filename).await
    }

    async fn load(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError> {
        (**self).load(locator).await
    }
}

/// Object store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Arc<[u8]>>,
}

impl MemoryObjectStore {
    /// Namespace reported in locators
    pub const BUCKET: &'static str = "memory";

    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ObjectLocator, StorageError> {
        let key = upload_key(filename)?;
        self.objects.insert(key.clone(), Arc::from(bytes));
        Ok(ObjectLocator::new(Self::BUCKET, key))
    }

    async fn load(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError> {
        self.objects
            .get(&locator.key)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }
}

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket(&self) -> String {
        self.root.display().to_string()
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ObjectLocator, StorageError> {
        let key = upload_key(filename)?;
        let path = self.object_path(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_error("create", parent, e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::io_error("write", &path, e))?;

        tracing::debug!(key = %key, bytes = bytes.len(), "stored upload");
        Ok(ObjectLocator::new(self.bucket(), key))
    }

    async fn load(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(&locator.key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(locator.to_string()))
            }
            Err(e) => Err(StorageError::io_error("read", path, e)),
        }
    }
}
