//! Image backup management.
//!
//! Originals are snapshotted lazily before an image's first modification and
//! restored exactly once per modification cycle:
//!
//! - `ensure_backup` is create-if-absent: at most one live record per image,
//!   never overwritten with already-watermarked bytes
//! - `restore` writes the original bytes back and clears the record
//! - concurrent calls for the same image serialize on a per-image lock

pub mod error;
pub mod manager;
pub mod store;

pub use error::BackupError;
pub use manager::BackupManager;
pub use store::{BackupRecord, BackupStore, MemoryBackupStore};
