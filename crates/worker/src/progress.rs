//! Batch progress tracking over the versioned counter store.

use chrono::Utc;
use tracing::info;

use pixport_core::{BatchRecord, BatchState, CounterField, RequestId};
use pixport_infra::counter::{CounterError, VersionedCounterStore};
use pixport_infra::record_store::{RecordStore, RecordStoreError};
use pixport_infra::retry::RetryPolicy;

/// Domain layer over the counter store: per-batch uploaded/converted counts
/// and the state label.
///
/// `record_file_converted` returns the record image produced by the winning
/// write. Callers deciding on completion must use that image and never a
/// fresh read: a read after the write would race against other workers and
/// reintroduce the lost-update window the counter store closes.
#[derive(Debug)]
pub struct BatchProgress<S> {
    counter: VersionedCounterStore<S>,
}

impl<S: RecordStore> BatchProgress<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self {
            counter: VersionedCounterStore::new(store, policy),
        }
    }

    /// Register a newly submitted batch: counters at zero, version stamped
    /// from the creation instant.
    pub async fn create_batch(
        &self,
        request_id: RequestId,
        total_expected: u64,
    ) -> Result<BatchRecord, RecordStoreError> {
        let record = BatchRecord::new(request_id, total_expected, Utc::now());
        self.counter.store().insert(record.clone()).await?;
        info!(request_id = %request_id, total_expected, "batch registered");
        Ok(record)
    }

    /// Count a file's arrival. Best-effort accounting: the result is never
    /// consulted for control decisions.
    pub async fn record_file_seen(&self, request_id: RequestId) -> Result<(), CounterError> {
        self.counter
            .increment(request_id, CounterField::Uploaded)
            .await
            .map(|_| ())
    }

    /// Count a file's conversion and return the post-increment record.
    pub async fn record_file_converted(
        &self,
        request_id: RequestId,
    ) -> Result<BatchRecord, CounterError> {
        self.counter
            .increment(request_id, CounterField::Converted)
            .await
    }

    /// Mark the batch FAILED. Unconditional write; counters are untouched.
    pub async fn mark_failed(&self, request_id: RequestId) -> Result<(), RecordStoreError> {
        self.counter
            .store()
            .set_state(request_id, BatchState::Failed)
            .await
    }

    /// Consistent read of the current record, for status queries.
    pub async fn status(&self, request_id: RequestId) -> Result<BatchRecord, RecordStoreError> {
        self.counter.store().load(request_id).await
    }
}
