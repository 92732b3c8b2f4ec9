use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use pixport_core::{BatchRecord, BatchState, CounterField, RequestId};

use super::r#trait::{RecordStore, RecordStoreError};

/// In-memory record store.
///
/// Intended for tests/dev. The whole map sits behind one lock, so the
/// conditional write is trivially atomic; a real backend gets the same
/// atomicity from its conditional-write primitive.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RequestId, BatchRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next version token: wall clock in milliseconds, bumped past the
    /// previous token when the clock has not advanced (sub-millisecond
    /// successive writes must still produce strictly increasing versions).
    fn next_version(previous: u64) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        now.max(previous + 1)
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load(&self, request_id: RequestId) -> Result<BatchRecord, RecordStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| RecordStoreError::Unavailable("lock poisoned".to_string()))?;

        records
            .get(&request_id)
            .cloned()
            .ok_or(RecordStoreError::NotFound)
    }

    async fn insert(&self, record: BatchRecord) -> Result<(), RecordStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RecordStoreError::Unavailable("lock poisoned".to_string()))?;

        if records.contains_key(&record.request_id) {
            return Err(RecordStoreError::AlreadyExists(record.request_id));
        }

        records.insert(record.request_id, record);
        Ok(())
    }

    async fn increment_if_version(
        &self,
        request_id: RequestId,
        counter: CounterField,
        state: BatchState,
        expected_version: u64,
    ) -> Result<BatchRecord, RecordStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RecordStoreError::Unavailable("lock poisoned".to_string()))?;

        let record = records.get_mut(&request_id).ok_or(RecordStoreError::NotFound)?;

        if record.version != expected_version {
            return Err(RecordStoreError::VersionConflict(format!(
                "expected version {expected_version}, found {}",
                record.version
            )));
        }

        match counter {
            CounterField::Uploaded => record.uploaded_count += 1,
            CounterField::Converted => record.converted_count += 1,
        }
        record.state = state;
        record.version = Self::next_version(record.version);

        Ok(record.clone())
    }

    async fn set_state(
        &self,
        request_id: RequestId,
        state: BatchState,
    ) -> Result<(), RecordStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RecordStoreError::Unavailable("lock poisoned".to_string()))?;

        let record = records.get_mut(&request_id).ok_or(RecordStoreError::NotFound)?;
        record.state = state;
        record.version = Self::next_version(record.version);

        Ok(())
    }
}
