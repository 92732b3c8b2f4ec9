//! Object storage boundary.
//!
//! Source images are fetched from and converted images written back to an
//! external object store. The core only needs unconditional byte get/put
//! plus the metadata map carried alongside each object.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Metadata key carrying the requested output mime type.
pub const METADATA_TARGET_FORMAT: &str = "target-format";
/// Metadata key carrying the file name the user uploaded.
pub const METADATA_ORIGINAL_NAME: &str = "original-name";

/// An object's bytes together with its metadata map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("object storage io failure: {0}")]
    Io(String),
}

/// Bucketed byte storage.
///
/// Get/put are unconditional copies; a failure mid-transfer is surfaced as
/// [`ObjectStoreError::Io`] and never retried by this core, since safely
/// resuming a partial transfer needs idempotence the backend may not offer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError>;
}

#[async_trait]
impl<S> ObjectStore for Arc<S>
where
    S: ObjectStore + ?Sized,
{
    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError> {
        (**self).get(bucket, key).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        (**self).put(bucket, key, bytes, metadata).await
    }
}

/// In-memory object store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct lookup for assertions.
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| ObjectStoreError::Io("lock poisoned".to_string()))?;

        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| ObjectStoreError::Io("lock poisoned".to_string()))?;

        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject { bytes, metadata },
        );
        Ok(())
    }
}
