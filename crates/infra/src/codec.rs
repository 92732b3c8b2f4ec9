//! Image codec boundary.
//!
//! Decode/encode is an opaque, synchronous, fallible collaborator. The core
//! never looks inside the decoded image; it only moves it between the two
//! calls.

use std::sync::Arc;

use thiserror::Error;

use pixport_core::ImageFormat;

/// A decoded raster image.
///
/// The pixel buffer layout is an agreement between a codec's decode and
/// encode halves; nothing else reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),
}

/// Decode and re-encode boundary.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Image, CodecError>;

    fn encode(&self, image: &Image, target: ImageFormat) -> Result<Vec<u8>, CodecError>;
}

impl<C> ImageCodec for Arc<C>
where
    C: ImageCodec + ?Sized,
{
    fn decode(&self, bytes: &[u8]) -> Result<Image, CodecError> {
        (**self).decode(bytes)
    }

    fn encode(&self, image: &Image, target: ImageFormat) -> Result<Vec<u8>, CodecError> {
        (**self).encode(image, target)
    }
}
