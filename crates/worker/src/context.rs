//! Explicit collaborator wiring.

use std::sync::Arc;

use pixport_infra::codec::ImageCodec;
use pixport_infra::object_store::ObjectStore;
use pixport_infra::record_store::RecordStore;
use pixport_infra::transport::MessageTransport;

use crate::config::WorkerConfig;

/// Everything a worker invocation needs, created once at process start and
/// passed by reference. No process-wide singleton clients.
#[derive(Clone)]
pub struct WorkerContext {
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub codec: Arc<dyn ImageCodec>,
    pub transport: Arc<dyn MessageTransport>,
    pub config: WorkerConfig,
}

impl WorkerContext {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        codec: Arc<dyn ImageCodec>,
        transport: Arc<dyn MessageTransport>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            records,
            objects,
            codec,
            transport,
            config,
        }
    }
}
