//! End-to-end tests for the conversion pipeline.
//!
//! Wires the worker against in-memory collaborators and exercises the
//! properties the core exists for: the format gate runs before any store
//! mutation, concurrent conversions lose no counts, and the completion
//! signal fires exactly once per batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pixport_core::{BatchState, ImageFormat, RequestId};
use pixport_infra::codec::{CodecError, Image, ImageCodec};
use pixport_infra::object_store::{
    InMemoryObjectStore, METADATA_ORIGINAL_NAME, METADATA_TARGET_FORMAT, ObjectStore,
};
use pixport_infra::record_store::InMemoryRecordStore;
use pixport_infra::retry::RetryPolicy;
use pixport_infra::transport::{InMemoryTransport, MessageTransport, TransportError};

use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::dispatch::CompletionMessage;
use crate::handler::{ConvertError, ConvertOutcome, ConvertWorker, ObjectCreatedEvent};

/// Codec stand-in: "decodes" the byte stream as a one-row raster and tags
/// the encoded output with the target extension.
struct StripeCodec;

impl ImageCodec for StripeCodec {
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
        let mut out = Vec::with_capacity(image.pixels.len() + 8);
        out.extend_from_slice(target.extension().as_bytes());
        out.push(b':');
        out.extend_from_slice(&image.pixels);
        Ok(out)
    }
}

/// Codec that cannot read anything.
struct RefusingCodec;

impl ImageCodec for RefusingCodec {
    fn decode(&self, _bytes: &[u8]) -> Result<Image, CodecError> {
        Err(CodecError::Decode("synthetic decode failure".to_string()))
    }

    fn encode(&self, _image: &Image, _target: ImageFormat) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("unreachable".to_string()))
    }
}

/// Transport whose queue rejects everything.
struct RefusingTransport;

#[async_trait]
impl MessageTransport for RefusingTransport {
    async fn send(
        &self,
        _queue: &str,
        _payload: serde_json::Value,
        _delay: Duration,
    ) -> Result<(), TransportError> {
        Err(TransportError::Send("queue rejected message".to_string()))
    }
}

struct Harness {
    worker: ConvertWorker,
    objects: Arc<InMemoryObjectStore>,
    transport: Arc<InMemoryTransport>,
}

fn test_config() -> WorkerConfig {
    WorkerConfig {
        retry: RetryPolicy::new(8, Duration::from_millis(1), Duration::from_millis(16)),
        ..WorkerConfig::default()
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(StripeCodec))
}

fn harness_with(codec: Arc<dyn ImageCodec>) -> Harness {
    pixport_observability::init();

    let objects = Arc::new(InMemoryObjectStore::new());
    let transport = Arc::new(InMemoryTransport::new());
    let ctx = WorkerContext::new(
        Arc::new(InMemoryRecordStore::new()),
        objects.clone(),
        codec,
        transport.clone(),
        test_config(),
    );

    Harness {
        worker: ConvertWorker::new(&ctx),
        objects,
        transport,
    }
}

fn source_key(request_id: RequestId, file: &str) -> String {
    format!("OriginalImages/{request_id}/{file}")
}

async fn seed_object(objects: &InMemoryObjectStore, key: &str, name: &str, target_mime: &str) {
    let metadata = HashMap::from([
        (METADATA_TARGET_FORMAT.to_string(), target_mime.to_string()),
        (METADATA_ORIGINAL_NAME.to_string(), name.to_string()),
    ]);
    objects
        .put("uploads", key, format!("pixels-of-{name}").into_bytes(), metadata)
        .await
        .unwrap();
}

#[tokio::test]
async fn single_file_batch_converts_and_dispatches() {
    let h = harness();
    let id = RequestId::new();
    h.worker.progress().create_batch(id, 1).await.unwrap();

    let key = source_key(id, "portrait.png");
    seed_object(&h.objects, &key, "portrait", "image/jpeg").await;

    let outcome = h
        .worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key: key.clone(),
        })
        .await
        .unwrap();

    let output_key = format!("Converted/{id}/portrait.jpeg");
    assert_eq!(
        outcome,
        ConvertOutcome::Converted {
            request_id: id,
            output_key: output_key.clone(),
            completed: true,
        }
    );

    // Converted bytes landed under the output prefix with the original name.
    let converted = h.objects.object("uploads", &output_key).unwrap();
    assert!(converted.bytes.starts_with(b"jpeg:"));
    assert_eq!(
        converted.metadata.get(METADATA_ORIGINAL_NAME).map(String::as_str),
        Some("portrait")
    );

    let record = h.worker.progress().status(id).await.unwrap();
    assert_eq!(record.uploaded_count, 1);
    assert_eq!(record.converted_count, 1);
    assert_eq!(record.state, BatchState::Converting);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    let message: CompletionMessage = serde_json::from_value(sent[0].payload.clone()).unwrap();
    assert_eq!(message.prefix, format!("Converted/{id}"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batch_fires_completion_exactly_once() {
    let h = harness();
    let id = RequestId::new();
    h.worker.progress().create_batch(id, 3).await.unwrap();

    let files = ["a.png", "b.gif", "c.tiff"];
    for file in files {
        seed_object(&h.objects, &source_key(id, file), file, "image/png").await;
    }

    let worker = Arc::new(h.worker);
    let mut handles = Vec::new();
    for file in files {
        let worker = worker.clone();
        let key = source_key(id, file);
        handles.push(tokio::spawn(async move {
            worker
                .handle(ObjectCreatedEvent {
                    bucket: "uploads".to_string(),
                    key,
                })
                .await
        }));
    }

    let mut completions = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ConvertOutcome::Converted { completed, .. } => {
                if completed {
                    completions += 1;
                }
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    // Exactly one invocation observed the completing increment.
    assert_eq!(completions, 1);
    assert_eq!(h.transport.sent().len(), 1);

    let record = worker.progress().status(id).await.unwrap();
    assert_eq!(record.converted_count, 3);
    assert_eq!(record.uploaded_count, 3);
    assert_eq!(record.state, BatchState::Converting);
}

#[tokio::test]
async fn heic_source_is_accepted_as_a_no_op() {
    let h = harness();
    let id = RequestId::new();
    let before = h.worker.progress().create_batch(id, 1).await.unwrap();

    let outcome = h
        .worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key: source_key(id, "IMG_0042.HEIC"),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ConvertOutcome::Skipped {
            extension: "heic".to_string()
        }
    );

    // Nothing was converted, counted or dispatched.
    let record = h.worker.progress().status(id).await.unwrap();
    assert_eq!(record, before);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn unknown_extension_fails_before_any_store_mutation() {
    let h = harness();
    let id = RequestId::new();
    let before = h.worker.progress().create_batch(id, 1).await.unwrap();

    let err = h
        .worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key: source_key(id, "archive.xyz"),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::UnsupportedFormat(_)));

    let record = h.worker.progress().status(id).await.unwrap();
    assert_eq!(record, before);
    assert_eq!(record.version, before.version);
}

#[tokio::test]
async fn decode_failure_marks_batch_failed_without_counting() {
    let h = harness_with(Arc::new(RefusingCodec));
    let id = RequestId::new();
    h.worker.progress().create_batch(id, 1).await.unwrap();

    let key = source_key(id, "broken.bmp");
    seed_object(&h.objects, &key, "broken", "image/png").await;

    let err = h
        .worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Codec(_)));

    let record = h.worker.progress().status(id).await.unwrap();
    assert_eq!(record.state, BatchState::Failed);
    assert_eq!(record.converted_count, 0);
    // The arrival had already been counted before the decode ran.
    assert_eq!(record.uploaded_count, 1);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn missing_target_format_metadata_fails_batch() {
    let h = harness();
    let id = RequestId::new();
    h.worker.progress().create_batch(id, 1).await.unwrap();

    let key = source_key(id, "untagged.png");
    let metadata = HashMap::from([(METADATA_ORIGINAL_NAME.to_string(), "untagged".to_string())]);
    h.objects
        .put("uploads", &key, b"pixels".to_vec(), metadata)
        .await
        .unwrap();

    let err = h
        .worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::MissingMetadata(METADATA_TARGET_FORMAT)
    ));
    let record = h.worker.progress().status(id).await.unwrap();
    assert_eq!(record.state, BatchState::Failed);
}

#[tokio::test]
async fn dispatch_failure_keeps_recorded_progress() {
    pixport_observability::init();

    let records = Arc::new(InMemoryRecordStore::new());
    let objects = Arc::new(InMemoryObjectStore::new());
    let ctx = WorkerContext::new(
        records.clone(),
        objects.clone(),
        Arc::new(StripeCodec),
        Arc::new(RefusingTransport),
        test_config(),
    );
    let worker = ConvertWorker::new(&ctx);

    let id = RequestId::new();
    worker.progress().create_batch(id, 1).await.unwrap();
    let key = source_key(id, "last.png");
    seed_object(&objects, &key, "last", "image/png").await;

    let err = worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Dispatch(_)));

    // The increment stands; the batch is complete in the record and an
    // external reconciliation sweep owns re-dispatching it.
    let record = worker.progress().status(id).await.unwrap();
    assert_eq!(record.converted_count, 1);
    assert_eq!(record.state, BatchState::Converting);
}

#[tokio::test]
async fn conversion_for_unknown_request_surfaces_not_found() {
    let h = harness();
    let id = RequestId::new();

    let key = source_key(id, "orphan.png");
    seed_object(&h.objects, &key, "orphan", "image/png").await;

    let err = h
        .worker
        .handle(ObjectCreatedEvent {
            bucket: "uploads".to_string(),
            key,
        })
        .await
        .unwrap_err();

    // The arrival accounting already warned; the conversion then fails on
    // the converted-count increment.
    assert!(matches!(
        err,
        ConvertError::Counter(pixport_infra::counter::CounterError::NotFound)
    ));
}
