//! External media contracts.
//!
//! The engine never draws pixels or touches storage directly; it consumes
//! two collaborator traits:
//!
//! - [`RenderEngine`] composes a watermark overlay onto image bytes
//! - [`ImageStore`] reads and writes image bytes by id
//!
//! Mime detection is done here from magic bytes so definition filtering
//! never depends on caller-supplied content types.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::definition::WatermarkParams;

/// Identifier of an image in the media library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Image store error types.
#[derive(Debug)]
pub enum ImageStoreError {
    /// Image id is unknown to the store
    NotFound(ImageId),
    /// Underlying I/O failure
    Io(String),
}

impl fmt::Display for ImageStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "Image not found: {}", id),
            Self::Io(msg) => write!(f, "Image store I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ImageStoreError {}

/// Failure reported by the external render engine.
#[derive(Debug, Clone)]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Render failed: {}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// Overlay composition contract. Timeouts are the engine's responsibility;
/// the coordinator treats any error as a per-item failure.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Compose the overlay described by `params` onto `image`, returning the
    /// new image bytes.
    async fn render(&self, image: &Bytes, params: &WatermarkParams) -> Result<Bytes, RenderError>;
}

/// Image byte storage contract.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Read the current bytes of an image.
    async fn read_bytes(&self, id: &ImageId) -> Result<Bytes, ImageStoreError>;

    /// Replace the bytes of an image.
    async fn write_bytes(&self, id: &ImageId, bytes: Bytes) -> Result<(), ImageStoreError>;
}

/// Detect an image mime type from magic bytes.
///
/// Returns None for formats the engine does not watermark.
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data) {
        Ok(format) => match format {
            image::ImageFormat::Jpeg => Some("image/jpeg"),
            image::ImageFormat::Png => Some("image/png"),
            image::ImageFormat::Gif => Some("image/gif"),
            image::ImageFormat::WebP => Some("image/webp"),
            _ => None,
        },
        Err(_) => None,
    }
}
