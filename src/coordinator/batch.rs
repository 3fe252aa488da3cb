//! Batch result accounting and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backup::BackupError;
use crate::media::{ImageId, ImageStoreError, RenderError};

/// Cooperative cancellation flag for a running batch.
///
/// Checked between items, never mid-item: cancelling after item k leaves
/// items k+1..n reported as skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Items already finished are unaffected.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-image failure kinds recorded into a batch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// Image bytes are not a supported image format
    UnsupportedMime,
    /// No published definition's mime filter accepts this image
    NoMatchingDefinition,
    /// Restore requested with no backup on record
    NoBackup,
    /// Image id unknown to the image store
    ImageNotFound,
    /// Image store I/O failure
    Io(String),
    /// Render engine failure (including engine-side timeouts)
    Render(String),
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMime => write!(f, "Unsupported image format"),
            Self::NoMatchingDefinition => write!(f, "No published watermark matches this image"),
            Self::NoBackup => write!(f, "No backup exists for this image"),
            Self::ImageNotFound => write!(f, "Image not found"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Render(msg) => write!(f, "Render failed: {}", msg),
        }
    }
}

impl From<BackupError> for ItemError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::NoBackup(_) => Self::NoBackup,
            BackupError::Image(img) => img.into(),
            BackupError::Store(msg) => Self::Io(msg),
        }
    }
}

impl From<ImageStoreError> for ItemError {
    fn from(err: ImageStoreError) -> Self {
        match err {
            ImageStoreError::NotFound(_) => Self::ImageNotFound,
            ImageStoreError::Io(msg) => Self::Io(msg),
        }
    }
}

impl From<RenderError> for ItemError {
    fn from(err: RenderError) -> Self {
        Self::Render(err.message)
    }
}

/// A failed item with its cause, in input order.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub image_id: ImageId,
    pub error: ItemError,
}

/// Aggregate outcome of one coordinator call.
///
/// Built fresh per invocation and never shared across requests. Invariants:
/// `succeeded + failed == processed` and `processed + skipped == total`.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures in input order
    pub failures: Vec<ItemFailure>,
    /// Items not processed because the batch was cancelled, in input order
    pub skipped: Vec<ImageId>,
}

impl BatchResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, image_id: ImageId, error: ItemError) {
        self.processed += 1;
        self.failed += 1;
        self.failures.push(ItemFailure { image_id, error });
    }

    pub fn record_skipped(&mut self, image_id: ImageId) {
        self.skipped.push(image_id);
    }

    /// Whether the batch ran to completion without cancellation.
    pub fn completed(&self) -> bool {
        self.skipped.is_empty() && self.processed == self.total
    }
}
