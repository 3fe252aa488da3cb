//! Backup lifecycle manager.
//!
//! The manager owns the only shared mutable resource in the engine: the
//! per-image backup lifecycle. Both `ensure_backup` and `restore` take the
//! same per-image async lock, so an apply and a restore racing on one image
//! serialize around its backup record.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::media::{ImageId, ImageStore};

use super::error::BackupError;
use super::store::{BackupRecord, BackupStore};

/// Snapshots an image's original bytes before first modification and
/// restores them exactly once per modification cycle.
pub struct BackupManager {
    images: Arc<dyn ImageStore>,
    store: Arc<dyn BackupStore>,
    locks: Mutex<HashMap<ImageId, Arc<tokio::sync::Mutex<()>>>>,
}

impl BackupManager {
    pub fn new(images: Arc<dyn ImageStore>, store: Arc<dyn BackupStore>) -> Self {
        Self {
            images,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn image_lock(&self, image_id: &ImageId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(image_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Create a backup of the image's current bytes if none exists.
    ///
    /// Idempotent: a second call before a restore returns the existing
    /// record and never snapshots already-modified bytes. Concurrent callers
    /// for the same image serialize; the second observes the first's record.
    pub async fn ensure_backup(&self, image_id: &ImageId) -> Result<BackupRecord, BackupError> {
        let lock = self.image_lock(image_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.load(image_id).await? {
            return Ok(existing);
        }

        let bytes = self.images.read_bytes(image_id).await?;
        let record = BackupRecord::new(image_id.clone(), bytes);
        tracing::debug!(image_id = %image_id, checksum = %record.checksum, "created backup");
        self.store.save_if_absent(record).await
    }

    /// Restore the image's original bytes and clear the backup record.
    ///
    /// Fails with `NoBackup` if nothing is on record for the image.
    pub async fn restore(&self, image_id: &ImageId) -> Result<(), BackupError> {
        let lock = self.image_lock(image_id);
        let _guard = lock.lock().await;

        let record = self
            .store
            .load(image_id)
            .await?
            .ok_or_else(|| BackupError::NoBackup(image_id.clone()))?;

        self.images
            .write_bytes(image_id, record.original.clone())
            .await?;
        self.store.remove(image_id).await?;
        tracing::debug!(image_id = %image_id, "restored original bytes");
        Ok(())
    }

    /// Whether a backup exists for the image.
    pub async fn has_backup(&self, image_id: &ImageId) -> Result<bool, BackupError> {
        self.store.has(image_id).await
    }
}
