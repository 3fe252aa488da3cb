// Test utilities: in-memory image store and scripted render engine

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use sukashi::backup::{BackupManager, MemoryBackupStore};
use sukashi::config::EngineConfig;
use sukashi::coordinator::{CancelFlag, Coordinator};
use sukashi::definition::{
    DefinitionId, DefinitionStore, OverlayPosition, TextParams, WatermarkParams,
};
use sukashi::media::{ImageId, ImageStore, ImageStoreError, RenderEngine, RenderError};
use sukashi::service::WatermarkService;
use sukashi::token::TokenIssuer;

pub const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// PNG magic bytes followed by a readable tag, so assertions can track
/// individual images through the batch.
pub fn png_bytes(tag: &str) -> Bytes {
    let mut data = PNG_MAGIC.to_vec();
    data.extend_from_slice(tag.as_bytes());
    Bytes::from(data)
}

pub struct MemoryImageStore {
    images: Mutex<HashMap<ImageId, Bytes>>,
}

impl MemoryImageStore {
    pub fn new(ids: &[&str]) -> Self {
        let mut images = HashMap::new();
        for id in ids {
            images.insert(ImageId::new(*id), png_bytes(id));
        }
        Self {
            images: Mutex::new(images),
        }
    }

    pub fn bytes_of(&self, id: &str) -> Option<Bytes> {
        self.images.lock().get(&ImageId::new(id)).cloned()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn read_bytes(&self, id: &ImageId) -> Result<Bytes, ImageStoreError> {
        self.images
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ImageStoreError::NotFound(id.clone()))
    }

    async fn write_bytes(&self, id: &ImageId, bytes: Bytes) -> Result<(), ImageStoreError> {
        self.images.lock().insert(id.clone(), bytes);
        Ok(())
    }
}

/// Render engine that appends a "+wm" marker to the image bytes.
///
/// Can be scripted to fail for specific image tags, and to flip a
/// cancellation flag after a given number of successful renders (to test
/// cooperative cancellation mid-batch).
pub struct MarkerEngine {
    fail_for: HashSet<String>,
    renders: AtomicUsize,
    cancel_after: Option<(usize, CancelFlag)>,
}

impl MarkerEngine {
    pub fn new() -> Self {
        Self {
            fail_for: HashSet::new(),
            renders: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    pub fn failing_for(tags: &[&str]) -> Self {
        Self {
            fail_for: tags.iter().map(|t| t.to_string()).collect(),
            renders: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    pub fn cancelling_after(renders: usize, flag: CancelFlag) -> Self {
        Self {
            fail_for: HashSet::new(),
            renders: AtomicUsize::new(0),
            cancel_after: Some((renders, flag)),
        }
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for MarkerEngine {
    async fn render(
        &self,
        image: &Bytes,
        _params: &WatermarkParams,
    ) -> Result<Bytes, RenderError> {
        let tag = String::from_utf8_lossy(&image[PNG_MAGIC.len()..]);
        if self.fail_for.iter().any(|f| tag.starts_with(f.as_str())) {
            return Err(RenderError::new("scripted failure"));
        }

        let done = self.renders.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, flag)) = &self.cancel_after {
            if done == *after {
                flag.cancel();
            }
        }

        let mut out = image.to_vec();
        out.extend_from_slice(b"+wm");
        Ok(Bytes::from(out))
    }
}

/// A fully wired engine over in-memory collaborators.
pub struct Harness {
    pub config: EngineConfig,
    pub issuer: Arc<TokenIssuer>,
    pub definitions: Arc<DefinitionStore>,
    pub backups: Arc<BackupManager>,
    pub images: Arc<MemoryImageStore>,
    pub engine: Arc<MarkerEngine>,
    pub coordinator: Arc<Coordinator>,
    pub service: WatermarkService,
}

pub fn harness(image_ids: &[&str]) -> Harness {
    harness_with_engine(image_ids, MarkerEngine::new())
}

pub fn harness_with_engine(image_ids: &[&str], engine: MarkerEngine) -> Harness {
    let config = EngineConfig {
        token_secret: "integration-secret".to_string(),
        ..Default::default()
    };
    let issuer = Arc::new(TokenIssuer::from_config(&config));
    let definitions = Arc::new(DefinitionStore::new(&config));
    let images = Arc::new(MemoryImageStore::new(image_ids));
    let backups = Arc::new(BackupManager::new(
        images.clone(),
        Arc::new(MemoryBackupStore::new()),
    ));
    let engine = Arc::new(engine);

    let coordinator = Arc::new(Coordinator::new(
        issuer.clone(),
        definitions.clone(),
        backups.clone(),
        engine.clone(),
        images.clone(),
        config.clone(),
    ));
    let service = WatermarkService::new(coordinator.clone(), definitions.clone());

    Harness {
        config,
        issuer,
        definitions,
        backups,
        images,
        engine,
        coordinator,
        service,
    }
}

pub fn text_params(text: &str) -> WatermarkParams {
    WatermarkParams::Text(TextParams {
        text: text.to_string(),
        font_size: 24,
        color: "#FFFFFF".to_string(),
        opacity: 0.5,
        position: OverlayPosition::BottomRight,
        margin: 10,
        rotation: None,
        tiled: false,
        mime_types: Vec::new(),
    })
}

pub fn publish_definition(harness: &Harness, title: &str) -> DefinitionId {
    let def = harness
        .definitions
        .create(title, text_params(title))
        .unwrap();
    harness.definitions.publish(def.id).unwrap();
    def.id
}

pub fn image_ids(tags: &[&str]) -> Vec<ImageId> {
    tags.iter().map(|t| ImageId::new(*t)).collect()
}
