//! Message transport boundary.
//!
//! The completion dispatcher hands finished batches to a downstream consumer
//! through this trait. Delivery is at-least-once; consumers must be
//! idempotent. Enqueue failures surface to the caller and are never
//! transactionally linked to record writes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("message enqueue failed: {0}")]
    Send(String),
}

/// Fire-and-forget queue send.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(
        &self,
        queue: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<(), TransportError>;
}

#[async_trait]
impl<T> MessageTransport for Arc<T>
where
    T: MessageTransport + ?Sized,
{
    async fn send(
        &self,
        queue: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<(), TransportError> {
        (**self).send(queue, payload, delay).await
    }
}

/// A message captured by the in-memory transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub queue: String,
    pub payload: serde_json::Value,
    pub delay: Duration,
}

/// In-memory transport for tests/dev: records every send.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    sent: Mutex<Vec<SentMessage>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn send(
        &self,
        queue: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<(), TransportError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TransportError::Send("lock poisoned".to_string()))?;

        sent.push(SentMessage {
            queue: queue.to_string(),
            payload,
            delay,
        });
        Ok(())
    }
}
