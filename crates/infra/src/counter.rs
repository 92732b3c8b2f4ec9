//! Versioned counter store: lost-update-free increments over the record store.
//!
//! The increment cycle is read → conditional write, retried under the
//! three-tier backoff policy when another writer wins the race. This is the
//! sole mutation path for progress counters, and the post-increment record
//! it returns is the only legitimate input to completion detection.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use pixport_core::{BatchRecord, BatchState, CounterField, RequestId};

use crate::record_store::{RecordStore, RecordStoreError};
use crate::retry::RetryPolicy;

/// Failure of a counter increment.
#[derive(Debug, Error)]
pub enum CounterError {
    /// Contention or store unavailability outlasted the retry budget.
    /// The record is left as last successfully written; bookkeeping for the
    /// batch stalls and an operator has to look.
    #[error("exhausted retries for counter update on {request_id} after {attempts} attempts")]
    Exhausted {
        request_id: RequestId,
        attempts: u32,
    },

    /// No record exists for the request; never retried.
    #[error("request record not found")]
    NotFound,

    /// Non-retriable store failure.
    #[error(transparent)]
    Store(RecordStoreError),
}

/// Increment primitive with optimistic concurrency control.
///
/// Wraps a [`RecordStore`] and turns its conditional write into a
/// lost-update-free `increment`: under arbitrary concurrent callers against
/// the same record, every successful call observes a strictly increasing
/// counter sequence and no two callers observe the same post-increment value.
#[derive(Debug)]
pub struct VersionedCounterStore<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: RecordStore> VersionedCounterStore<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The wrapped store, for operations that bypass the increment cycle
    /// (record creation, status reads, unconditional state writes).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Increment `counter` by one and return the new image of the record.
    ///
    /// Each cycle re-reads the record so the version token is current, then
    /// issues the conditional write. Version conflicts and transient store
    /// errors consult the retry policy; the read is inside the retried cycle
    /// because a failed read and a failed write leave the caller in the same
    /// position.
    pub async fn increment(
        &self,
        request_id: RequestId,
        counter: CounterField,
    ) -> Result<BatchRecord, CounterError> {
        let mut retry = self.policy.initial_state();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let outcome = match self.store.load(request_id).await {
                Ok(current) => {
                    self.store
                        .increment_if_version(
                            request_id,
                            counter,
                            BatchState::Converting,
                            current.version,
                        )
                        .await
                }
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(record) => {
                    debug!(
                        request_id = %request_id,
                        counter = counter.as_str(),
                        value = record.counter(counter),
                        attempts,
                        "counter updated"
                    );
                    return Ok(record);
                }
                Err(RecordStoreError::NotFound) => return Err(CounterError::NotFound),
                Err(err) if err.is_retriable() => err,
                Err(err) => return Err(CounterError::Store(err)),
            };

            match self.policy.after_failure(retry) {
                Some(next) => {
                    debug!(
                        request_id = %request_id,
                        counter = counter.as_str(),
                        error = %err,
                        tier = ?next.tier,
                        delay_ms = next.delay.as_millis() as u64,
                        attempts_remaining = next.attempts_remaining,
                        "counter update contended, retrying"
                    );
                    if next.delay > Duration::ZERO {
                        tokio::time::sleep(next.delay).await;
                    }
                    retry = next;
                }
                None => {
                    warn!(
                        request_id = %request_id,
                        counter = counter.as_str(),
                        attempts,
                        "counter update retries exhausted"
                    );
                    return Err(CounterError::Exhausted {
                        request_id,
                        attempts,
                    });
                }
            }
        }
    }
}
