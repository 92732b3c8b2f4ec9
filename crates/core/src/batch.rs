//! The batch progress record.
//!
//! One `BatchRecord` exists per conversion request and is the unit of
//! optimistic concurrency: every counter increment re-reads the record,
//! then writes conditioned on the `version` token still being current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::RequestId;

/// Lifecycle label of a batch.
///
/// Informational only: completion detection never gates on this field,
/// only on the counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    /// Record created, no uploads observed yet.
    Created,
    /// Files are arriving.
    Uploading,
    /// At least one conversion is in flight.
    Converting,
    /// Every file converted and the completion signal dispatched.
    Done,
    /// A file in the batch failed to convert.
    Failed,
}

impl core::fmt::Display for BatchState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            BatchState::Created => "CREATED",
            BatchState::Uploading => "UPLOADING",
            BatchState::Converting => "CONVERTING",
            BatchState::Done => "DONE",
            BatchState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Which progress counter an increment targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    /// Files observed arriving in the source bucket. Best-effort metric,
    /// never reconciled against `total_expected`.
    Uploaded,
    /// Files successfully converted and written back. Drives completion.
    Converted,
}

impl CounterField {
    /// Attribute name as stored/logged.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterField::Uploaded => "uploaded_count",
            CounterField::Converted => "converted_count",
        }
    }
}

/// Progress record for one conversion request.
///
/// Counters are only ever incremented, and only through the versioned
/// counter store; `version` is the optimistic-concurrency compare token,
/// replaced atomically on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub request_id: RequestId,
    pub state: BatchState,

    /// Timestamp-derived, strictly increasing write token.
    pub version: u64,

    pub uploaded_count: u64,
    pub converted_count: u64,

    /// Number of files in the batch, fixed at creation.
    pub total_expected: u64,

    pub created_at: DateTime<Utc>,
}

impl BatchRecord {
    /// Fresh record for a newly submitted batch: counters at zero, version
    /// stamped from the creation instant.
    pub fn new(request_id: RequestId, total_expected: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            state: BatchState::Created,
            version: created_at.timestamp_millis().max(0) as u64,
            uploaded_count: 0,
            converted_count: 0,
            total_expected,
            created_at,
        }
    }

    pub fn counter(&self, field: CounterField) -> u64 {
        match field {
            CounterField::Uploaded => self.uploaded_count,
            CounterField::Converted => self.converted_count,
        }
    }

    /// Whether every expected file has been converted.
    pub fn is_complete(&self) -> bool {
        self.converted_count == self.total_expected
    }
}
