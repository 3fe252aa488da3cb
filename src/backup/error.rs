//! Backup error types.

use std::fmt;

use crate::media::{ImageId, ImageStoreError};

/// Errors that can occur during backup operations.
#[derive(Debug)]
pub enum BackupError {
    /// Restore requested with no backup on record
    NoBackup(ImageId),
    /// Underlying image store failure
    Image(ImageStoreError),
    /// Backup storage backend failure
    Store(String),
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBackup(id) => write!(f, "No backup exists for image {}", id),
            Self::Image(err) => write!(f, "Backup image access failed: {}", err),
            Self::Store(msg) => write!(f, "Backup store error: {}", msg),
        }
    }
}

impl std::error::Error for BackupError {}

impl From<ImageStoreError> for BackupError {
    fn from(err: ImageStoreError) -> Self {
        Self::Image(err)
    }
}
