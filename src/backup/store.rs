//! Backup record storage.
//!
//! The `BackupStore` trait separates backup persistence from the manager's
//! lifecycle logic, so deployments can swap the in-memory store for a
//! durable one without touching ensure/restore semantics.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::media::ImageId;

use super::error::BackupError;

/// Snapshot of an image's original bytes, taken before first modification.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub image_id: ImageId,
    /// SHA-256 of the original bytes, hex encoded
    pub checksum: String,
    pub original: Bytes,
    pub created_at: DateTime<Utc>,
}

impl BackupRecord {
    pub fn new(image_id: ImageId, original: Bytes) -> Self {
        Self {
            checksum: sha256_hex(&original),
            image_id,
            original,
            created_at: Utc::now(),
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Backup record storage contract.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Store a record if none exists for its image.
    /// Returns the stored record: the existing one when present, otherwise
    /// the new one (create-if-absent).
    async fn save_if_absent(&self, record: BackupRecord) -> Result<BackupRecord, BackupError>;

    /// Load the record for an image, if any.
    async fn load(&self, image_id: &ImageId) -> Result<Option<BackupRecord>, BackupError>;

    /// Remove the record for an image.
    /// Returns true if a record was removed.
    async fn remove(&self, image_id: &ImageId) -> Result<bool, BackupError>;

    /// Whether a record exists for an image.
    async fn has(&self, image_id: &ImageId) -> Result<bool, BackupError>;

    /// Number of live records.
    async fn count(&self) -> Result<usize, BackupError>;
}

/// In-memory backup store.
pub struct MemoryBackupStore {
    records: Mutex<HashMap<ImageId, BackupRecord>>,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn save_if_absent(&self, record: BackupRecord) -> Result<BackupRecord, BackupError> {
        let mut records = self.records.lock();
        let entry = records
            .entry(record.image_id.clone())
            .or_insert(record);
        Ok(entry.clone())
    }

    async fn load(&self, image_id: &ImageId) -> Result<Option<BackupRecord>, BackupError> {
        Ok(self.records.lock().get(image_id).cloned())
    }

    async fn remove(&self, image_id: &ImageId) -> Result<bool, BackupError> {
        Ok(self.records.lock().remove(image_id).is_some())
    }

    async fn has(&self, image_id: &ImageId) -> Result<bool, BackupError> {
        Ok(self.records.lock().contains_key(image_id))
    }

    async fn count(&self) -> Result<usize, BackupError> {
        Ok(self.records.lock().len())
    }
}
