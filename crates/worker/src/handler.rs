//! The conversion entry point.
//!
//! One invocation per "file ready to convert" notification. The format gate
//! runs before any shared-state mutation; everything after the arrival
//! accounting can fail the batch, except counter exhaustion and dispatch
//! failure, which leave the record as last written.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use pixport_core::format::{self, SIDELINED_EXTENSION};
use pixport_core::{ImageFormat, RequestId};
use pixport_infra::codec::{CodecError, ImageCodec};
use pixport_infra::counter::CounterError;
use pixport_infra::object_store::{
    METADATA_ORIGINAL_NAME, METADATA_TARGET_FORMAT, ObjectStore, ObjectStoreError,
};
use pixport_infra::record_store::RecordStore;
use pixport_infra::transport::MessageTransport;

use crate::context::WorkerContext;
use crate::dispatch::{CompletionDispatcher, DispatchError};
use crate::progress::BatchProgress;

/// Inbound notification: an uploaded object is ready for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    pub bucket: String,
    pub key: String,
}

/// What an invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// File converted, uploaded and accounted.
    Converted {
        request_id: RequestId,
        output_key: String,
        /// Whether this invocation's increment completed the batch and
        /// dispatched the downstream signal.
        completed: bool,
    },
    /// Source format owned by a sibling worker; accepted without action.
    Skipped { extension: String },
}

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Source or target format outside the supported set. Raised before any
    /// store mutation when it is the source extension.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Object key does not carry a request id in its second path segment.
    #[error("malformed object key: {0}")]
    MalformedKey(String),

    #[error("object metadata missing `{0}`")]
    MissingMetadata(&'static str),

    /// Progress bookkeeping failed; includes retry exhaustion under
    /// contention. The batch record is left as last successfully written.
    #[error("progress bookkeeping failed: {0}")]
    Counter(#[from] CounterError),

    #[error("object storage failure: {0}")]
    StorageIo(#[from] ObjectStoreError),

    #[error("image codec failure: {0}")]
    Codec(#[from] CodecError),

    #[error("completion dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl ConvertError {
    /// Whether this failure should flip the batch to FAILED.
    ///
    /// Counter exhaustion leaves the record as last written (a bookkeeping
    /// stall, not a bad file), and a dispatch failure must not mask an
    /// already-recorded completion.
    fn fails_batch(&self) -> bool {
        matches!(
            self,
            ConvertError::UnsupportedFormat(_)
                | ConvertError::MissingMetadata(_)
                | ConvertError::StorageIo(_)
                | ConvertError::Codec(_)
        )
    }
}

/// Per-process conversion worker. Cheap to clone the wiring out of a
/// [`WorkerContext`]; invocations share no mutable state beyond the stores.
pub struct ConvertWorker {
    progress: BatchProgress<Arc<dyn RecordStore>>,
    dispatcher: CompletionDispatcher<Arc<dyn MessageTransport>>,
    objects: Arc<dyn ObjectStore>,
    codec: Arc<dyn ImageCodec>,
    source_prefix: String,
    output_prefix: String,
}

impl ConvertWorker {
    pub fn new(ctx: &WorkerContext) -> Self {
        Self {
            progress: BatchProgress::new(ctx.records.clone(), ctx.config.retry.clone()),
            dispatcher: CompletionDispatcher::new(
                ctx.transport.clone(),
                ctx.config.queue_name.clone(),
                ctx.config.output_prefix.clone(),
            ),
            objects: ctx.objects.clone(),
            codec: ctx.codec.clone(),
            source_prefix: ctx.config.source_prefix.clone(),
            output_prefix: ctx.config.output_prefix.clone(),
        }
    }

    /// The batch progress layer, for callers that register batches or serve
    /// status queries alongside conversion.
    pub fn progress(&self) -> &BatchProgress<Arc<dyn RecordStore>> {
        &self.progress
    }

    /// Handle one notification end to end.
    pub async fn handle(&self, event: ObjectCreatedEvent) -> Result<ConvertOutcome, ConvertError> {
        let extension = format::file_extension(&event.key)
            .ok_or_else(|| ConvertError::UnsupportedFormat("file has no extension".to_string()))?;

        if extension.eq_ignore_ascii_case(SIDELINED_EXTENSION) {
            info!(key = %event.key, "heic source, sibling worker owns it");
            return Ok(ConvertOutcome::Skipped {
                extension: extension.to_ascii_lowercase(),
            });
        }

        // Gate on the source format before touching any shared state.
        ImageFormat::from_extension(extension)
            .ok_or_else(|| ConvertError::UnsupportedFormat(extension.to_string()))?;

        let request_id = request_id_from_key(&event.key)?;

        // Arrival accounting is best-effort; a stall here must not block the
        // conversion itself.
        if let Err(err) = self.progress.record_file_seen(request_id).await {
            warn!(
                request_id = %request_id,
                error = %err,
                "uploaded-count accounting failed"
            );
        }

        match self.convert_and_account(&event, request_id).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if err.fails_batch() {
                    self.fail_batch(request_id).await;
                }
                Err(err)
            }
        }
    }

    async fn convert_and_account(
        &self,
        event: &ObjectCreatedEvent,
        request_id: RequestId,
    ) -> Result<ConvertOutcome, ConvertError> {
        let object = self.objects.get(&event.bucket, &event.key).await?;

        let target_mime = object
            .metadata
            .get(METADATA_TARGET_FORMAT)
            .ok_or(ConvertError::MissingMetadata(METADATA_TARGET_FORMAT))?;
        let original_name = object
            .metadata
            .get(METADATA_ORIGINAL_NAME)
            .ok_or(ConvertError::MissingMetadata(METADATA_ORIGINAL_NAME))?;
        let target = ImageFormat::from_mime(target_mime)
            .ok_or_else(|| ConvertError::UnsupportedFormat(target_mime.clone()))?;

        let image = self.codec.decode(&object.bytes)?;
        let converted = self.codec.encode(&image, target)?;

        let output_key = self.output_key(&event.key, target);
        let metadata = HashMap::from([(
            METADATA_ORIGINAL_NAME.to_string(),
            original_name.clone(),
        )]);
        self.objects
            .put(&event.bucket, &output_key, converted, metadata)
            .await?;

        let record = self.progress.record_file_converted(request_id).await?;
        let completed = self.dispatcher.maybe_fire(&record, &event.bucket).await?;

        Ok(ConvertOutcome::Converted {
            request_id,
            output_key,
            completed,
        })
    }

    fn output_key(&self, key: &str, target: ImageFormat) -> String {
        output_key(key, &self.source_prefix, &self.output_prefix, target)
    }

    async fn fail_batch(&self, request_id: RequestId) {
        if let Err(err) = self.progress.mark_failed(request_id).await {
            warn!(
                request_id = %request_id,
                error = %err,
                "could not mark batch FAILED"
            );
        }
    }
}

/// Converted files land under the output prefix, with the extension swapped
/// for the target format's.
fn output_key(key: &str, source_prefix: &str, output_prefix: &str, target: ImageFormat) -> String {
    let stem = key.rfind('.').map(|idx| &key[..idx]).unwrap_or(key);
    let relocated = match stem.strip_prefix(source_prefix) {
        Some(rest) => format!("{output_prefix}{rest}"),
        None => stem.to_string(),
    };
    format!("{relocated}.{}", target.extension())
}

/// The request id is the second path segment:
/// `OriginalImages/<request_id>/<file>`.
fn request_id_from_key(key: &str) -> Result<RequestId, ConvertError> {
    let mut segments = key.split('/');
    let _prefix = segments.next();
    let raw = segments
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| ConvertError::MalformedKey(key.to_string()))?;

    RequestId::from_str(raw).map_err(|_| ConvertError::MalformedKey(key.to_string()))
}
