//! `pixport-worker` — the conversion worker's domain flow.
//!
//! One inbound "file ready to convert" notification enters through
//! [`handler::ConvertWorker`]; it gates the format, accounts the file's
//! arrival, converts through the codec collaborator, accounts the conversion
//! through the versioned counter, and dispatches the one-shot downstream
//! signal on the increment that completes the batch.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod handler;
pub mod progress;

#[cfg(test)]
mod integration_tests;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use dispatch::{CompletionDispatcher, CompletionMessage, DispatchError};
pub use handler::{ConvertError, ConvertOutcome, ConvertWorker, ObjectCreatedEvent};
pub use progress::BatchProgress;
