//! Infrastructure layer: the progress record store, the optimistic-concurrency
//! counter machinery, and the external collaborator boundaries (object store,
//! image codec, message transport).

pub mod codec;
pub mod counter;
pub mod object_store;
pub mod record_store;
pub mod retry;
pub mod transport;

pub use counter::{CounterError, VersionedCounterStore};
pub use record_store::{InMemoryRecordStore, RecordStore, RecordStoreError};
pub use retry::{BackoffTier, RetryPolicy, RetryState};
