//! Image format model and filename/mime parsing.
//!
//! The worker gates inbound files on their extension before touching any
//! shared state, and resolves the target format from object metadata
//! (a mime type such as `image/jpeg`).

use serde::{Deserialize, Serialize};

/// Extension of sources a sibling worker owns; accepted here as a no-op.
pub const SIDELINED_EXTENSION: &str = "heic";

/// Formats this worker can convert from and to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Bmp,
    Pdf,
}

impl ImageFormat {
    /// Parse a filename extension (case-insensitive). `jpg`/`jpeg` and
    /// `tif`/`tiff` are aliases.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "bmp" => Some(ImageFormat::Bmp),
            "pdf" => Some(ImageFormat::Pdf),
            _ => None,
        }
    }

    /// Parse a mime type, e.g. `image/png` or `application/pdf`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/gif" => Some(ImageFormat::Gif),
            "image/tiff" => Some(ImageFormat::Tiff),
            "image/bmp" => Some(ImageFormat::Bmp),
            "application/pdf" => Some(ImageFormat::Pdf),
            _ => None,
        }
    }

    /// Canonical filename extension for output keys.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Pdf => "pdf",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Pdf => "application/pdf",
        }
    }
}

impl core::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Extension of a filename or object key, if it has one.
///
/// A trailing dot or a dotless name yields `None` rather than an empty or
/// whole-name "extension".
pub fn file_extension(name: &str) -> Option<&str> {
    let idx = name.rfind('.')?;
    let ext = &name[idx + 1..];
    if ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext)
}
