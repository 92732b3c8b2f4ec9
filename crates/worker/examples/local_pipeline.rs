//! Local end-to-end demo of the conversion pipeline.
//!
//! Wires the worker against in-memory collaborators, registers a two-file
//! batch, converts both files concurrently and prints the completion message
//! the downstream consumer would receive.
//!
//! Run with `cargo run -p pixport-worker --example local_pipeline`.

use std::collections::HashMap;
use std::sync::Arc;

use pixport_core::{ImageFormat, RequestId};
use pixport_infra::codec::{CodecError, Image, ImageCodec};
use pixport_infra::object_store::{
    InMemoryObjectStore, METADATA_ORIGINAL_NAME, METADATA_TARGET_FORMAT, ObjectStore,
};
use pixport_infra::record_store::InMemoryRecordStore;
use pixport_infra::transport::InMemoryTransport;
use pixport_worker::{ConvertWorker, ObjectCreatedEvent, WorkerConfig, WorkerContext};

/// Demo codec: passes pixel bytes through and tags the output with the
/// target extension. A real deployment plugs an actual codec in here.
struct TaggingCodec;

impl ImageCodec for TaggingCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Image, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Decode("empty object body".to_string()));
        }
        Ok(Image {
            width: bytes.len() as u32,
            height: 1,
            pixels: bytes.to_vec(),
        })
    }

    fn encode(&self, image: &Image, target: ImageFormat) -> Result<Vec<u8>, CodecError> {
        let mut out = format!("{}:", target.extension()).into_bytes();
        out.extend_from_slice(&image.pixels);
        Ok(out)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pixport_observability::init_with_filter("info,pixport_infra=debug");

    let objects = Arc::new(InMemoryObjectStore::new());
    let transport = Arc::new(InMemoryTransport::new());
    let ctx = WorkerContext::new(
        Arc::new(InMemoryRecordStore::new()),
        objects.clone(),
        Arc::new(TaggingCodec),
        transport.clone(),
        WorkerConfig::from_env(),
    );
    let worker = Arc::new(ConvertWorker::new(&ctx));

    let request_id = RequestId::new();
    worker.progress().create_batch(request_id, 2).await?;

    let files = [("beach.png", "image/jpeg"), ("city.bmp", "image/png")];
    for (name, target_mime) in files {
        let metadata = HashMap::from([
            (METADATA_TARGET_FORMAT.to_string(), target_mime.to_string()),
            (METADATA_ORIGINAL_NAME.to_string(), name.to_string()),
        ]);
        objects
            .put(
                "uploads",
                &format!("OriginalImages/{request_id}/{name}"),
                format!("pixels-of-{name}").into_bytes(),
                metadata,
            )
            .await?;
    }

    let (first, second) = tokio::join!(
        worker.handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key: format!("OriginalImages/{request_id}/beach.png"),
        }),
        worker.handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key: format!("OriginalImages/{request_id}/city.bmp"),
        }),
    );
    println!("first file: {:?}", first?);
    println!("second file: {:?}", second?);

    let record = worker.progress().status(request_id).await?;
    println!(
        "batch {request_id}: {}/{} converted, state {}",
        record.converted_count, record.total_expected, record.state
    );

    for message in transport.sent() {
        println!("dispatched to `{}`: {}", message.queue, message.payload);
    }

    Ok(())
}
