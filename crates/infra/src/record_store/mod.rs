//! Progress record store boundary.
//!
//! This module defines an infrastructure-facing abstraction for reading and
//! conditionally writing batch progress records without making any storage
//! assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryRecordStore;
pub use r#trait::{RecordStore, RecordStoreError};
