use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use pixport_core::{BatchRecord, BatchState, CounterField, RequestId};

/// Record store operation error.
///
/// ## Error Categories
///
/// - **VersionConflict**: the version-equality precondition failed; another
///   writer won the race since the caller's read. Expected under contention,
///   retried by the counter layer.
/// - **Unavailable**: transient backing-store failure (connection loss,
///   throttling). Retried through the same policy as conflicts.
/// - **NotFound**: no record exists for the key; a definite outcome, never
///   retried.
/// - **AlreadyExists** / **Invalid**: definite outcomes of bad requests.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("request record not found")]
    NotFound,

    #[error("optimistic concurrency check failed: {0}")]
    VersionConflict(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record already exists: {0}")]
    AlreadyExists(RequestId),

    #[error("invalid record operation: {0}")]
    Invalid(String),
}

impl RecordStoreError {
    /// Whether the counter layer should retry the whole read/write cycle.
    ///
    /// Conflicts and transient store errors go through the same backoff
    /// policy; everything else is a definite outcome.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RecordStoreError::VersionConflict(_) | RecordStoreError::Unavailable(_)
        )
    }
}

/// Keyed store of batch progress records.
///
/// ## Design Principles
///
/// - **No storage assumptions**: works with the in-memory implementation
///   (tests/dev) and any backend offering a consistent point read plus a
///   conditional write (production).
/// - **Consistent reads**: `load` must return the latest committed record.
///   A stale read would race against concurrent writers and corrupt the
///   version check above it.
/// - **Conditional writes**: `increment_if_version` is the sole mutation path
///   for counters. It must atomically check the stored version against
///   `expected_version`, and on success increment the named counter by one,
///   set the state label, stamp a fresh strictly-greater version, and return
///   the **new image** of the record. Returning the new image is what lets
///   the caller inspect post-increment counts without an extra racy read.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Consistent point read of a record.
    async fn load(&self, request_id: RequestId) -> Result<BatchRecord, RecordStoreError>;

    /// Create a record; fails with `AlreadyExists` if the key is taken.
    async fn insert(&self, record: BatchRecord) -> Result<(), RecordStoreError>;

    /// Conditional counter increment.
    ///
    /// Implementations must guarantee that of any set of concurrent calls
    /// carrying the same `expected_version`, at most one succeeds; the rest
    /// observe `VersionConflict`.
    async fn increment_if_version(
        &self,
        request_id: RequestId,
        counter: CounterField,
        state: BatchState,
        expected_version: u64,
    ) -> Result<BatchRecord, RecordStoreError>;

    /// Unconditional state-label write (e.g. marking a batch FAILED).
    async fn set_state(
        &self,
        request_id: RequestId,
        state: BatchState,
    ) -> Result<(), RecordStoreError>;
}

#[async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn load(&self, request_id: RequestId) -> Result<BatchRecord, RecordStoreError> {
        (**self).load(request_id).await
    }

    async fn insert(&self, record: BatchRecord) -> Result<(), RecordStoreError> {
        (**self).insert(record).await
    }

    async fn increment_if_version(
        &self,
        request_id: RequestId,
        counter: CounterField,
        state: BatchState,
        expected_version: u64,
    ) -> Result<BatchRecord, RecordStoreError> {
        (**self)
            .increment_if_version(request_id, counter, state, expected_version)
            .await
    }

    async fn set_state(
        &self,
        request_id: RequestId,
        state: BatchState,
    ) -> Result<(), RecordStoreError> {
        (**self).set_state(request_id, state).await
    }
}
