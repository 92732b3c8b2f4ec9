//! `pixport-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the batch record tracking a conversion request, the image format model,
//! strongly-typed identifiers and domain errors.

pub mod batch;
pub mod error;
pub mod format;
pub mod id;

pub use batch::{BatchRecord, BatchState, CounterField};
pub use error::{DomainError, DomainResult};
pub use format::ImageFormat;
pub use id::RequestId;
