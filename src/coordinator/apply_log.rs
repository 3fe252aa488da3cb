//! Per-image record of applied watermark definitions.
//!
//! Mirrors the media library's attachment metadata: which definitions are
//! currently stamped on each image. Used to skip re-rendering a definition
//! that is already present, and cleared when an image is restored.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::definition::DefinitionId;
use crate::media::ImageId;

#[derive(Default)]
pub struct ApplyLog {
    applied: Mutex<HashMap<ImageId, Vec<DefinitionId>>>,
}

impl ApplyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a definition was applied to an image.
    pub fn record(&self, image_id: ImageId, definition_id: DefinitionId) {
        let mut applied = self.applied.lock();
        let entries = applied.entry(image_id).or_default();
        if !entries.contains(&definition_id) {
            entries.push(definition_id);
        }
    }

    /// Whether a definition is already applied to an image.
    pub fn is_applied(&self, image_id: &ImageId, definition_id: DefinitionId) -> bool {
        self.applied
            .lock()
            .get(image_id)
            .map_or(false, |entries| entries.contains(&definition_id))
    }

    /// Definitions currently applied to an image, in application order.
    pub fn applied_definitions(&self, image_id: &ImageId) -> Vec<DefinitionId> {
        self.applied
            .lock()
            .get(image_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Clear the record for an image (after its original bytes come back).
    pub fn clear(&self, image_id: &ImageId) {
        self.applied.lock().remove(image_id);
    }
}
