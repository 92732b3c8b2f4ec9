//! Completion detection and the one-shot downstream signal.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use pixport_core::{BatchRecord, RequestId};
use pixport_infra::transport::{MessageTransport, TransportError};

/// Payload handed to the downstream consumer when a batch finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub request_id: RequestId,
    pub bucket: String,
    /// Key prefix the converted files live under.
    pub prefix: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("completion payload serialization failed: {0}")]
    Serialize(String),
}

/// Fires the downstream signal exactly once per batch.
///
/// The exactly-once property is not enforced here; it falls out of the
/// caller contract: `maybe_fire` must only ever be given the record image
/// returned by a winning counter increment. Only the single increment that
/// makes the counts equal observes that post-state, so only one invocation
/// can fire. Enqueue failure surfaces to the caller and never rolls the
/// counter back; a crash between the two leaves a completed-but-undispatched
/// batch for an external reconciliation sweep.
#[derive(Debug)]
pub struct CompletionDispatcher<T> {
    transport: T,
    queue_name: String,
    output_prefix: String,
}

impl<T: MessageTransport> CompletionDispatcher<T> {
    pub fn new(
        transport: T,
        queue_name: impl Into<String>,
        output_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            queue_name: queue_name.into(),
            output_prefix: output_prefix.into(),
        }
    }

    /// Send the completion signal iff every expected file is converted.
    ///
    /// Returns whether the signal was sent. Unequal counts are a normal
    /// no-op, not an error.
    pub async fn maybe_fire(
        &self,
        record: &BatchRecord,
        bucket: &str,
    ) -> Result<bool, DispatchError> {
        if !record.is_complete() {
            return Ok(false);
        }

        let message = CompletionMessage {
            request_id: record.request_id,
            bucket: bucket.to_string(),
            prefix: output_location(&self.output_prefix, record.request_id),
        };
        let payload = serde_json::to_value(&message)
            .map_err(|e| DispatchError::Serialize(e.to_string()))?;

        self.transport
            .send(&self.queue_name, payload, Duration::ZERO)
            .await?;

        info!(
            request_id = %record.request_id,
            queue = %self.queue_name,
            converted = record.converted_count,
            "batch complete, downstream signal dispatched"
        );
        Ok(true)
    }
}

fn output_location(prefix: &str, request_id: RequestId) -> String {
    format!("{prefix}/{request_id}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use pixport_infra::transport::InMemoryTransport;

    fn record(converted: u64, total: u64) -> BatchRecord {
        let mut record = BatchRecord::new(RequestId::new(), total, Utc::now());
        record.converted_count = converted;
        record
    }

    fn dispatcher(transport: Arc<InMemoryTransport>) -> CompletionDispatcher<Arc<InMemoryTransport>> {
        CompletionDispatcher::new(transport, "done-queue", "Converted")
    }

    #[tokio::test]
    async fn incomplete_batch_is_a_no_op() {
        let transport = Arc::new(InMemoryTransport::new());
        let dispatcher = dispatcher(transport.clone());

        let fired = dispatcher.maybe_fire(&record(3, 5), "bucket").await.unwrap();

        assert!(!fired);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn complete_batch_fires_with_output_prefix() {
        let transport = Arc::new(InMemoryTransport::new());
        let dispatcher = dispatcher(transport.clone());
        let record = record(3, 3);

        let fired = dispatcher.maybe_fire(&record, "bucket").await.unwrap();
        assert!(fired);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].queue, "done-queue");
        assert_eq!(sent[0].delay, Duration::ZERO);

        let message: CompletionMessage = serde_json::from_value(sent[0].payload.clone()).unwrap();
        assert_eq!(message.request_id, record.request_id);
        assert_eq!(message.bucket, "bucket");
        assert_eq!(message.prefix, format!("Converted/{}", record.request_id));
    }
}
