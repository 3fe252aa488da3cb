//! Bulk operation coordinator.
//!
//! Turns a client-issued "apply to N images" or "restore N images" request
//! into a sequence of authorized, individually tracked per-image operations:
//!
//! - validates the purpose-bound token before any image is touched
//! - resolves definitions (best-fit by mime, or a forced single definition)
//! - ensures a backup exists before the first modification of each image
//! - delegates pixel composition to the external render engine
//! - aggregates per-item outcomes into a [`BatchResult`]
//!
//! Failures during iteration never abort the batch; authorization and
//! definition-resolution failures abort it before any image is processed.
//! Cancellation is cooperative and checked between items.

pub mod apply_log;
pub mod batch;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::backup::BackupManager;
use crate::config::EngineConfig;
use crate::context::OperationContext;
use crate::definition::{
    DefinitionId, DefinitionStatus, DefinitionStore, StoreError, WatermarkDefinition,
    WatermarkParams,
};
use crate::media::{detect_mime, ImageId, ImageStore, ImageStoreError, RenderEngine, RenderError};
use crate::token::{Purpose, TokenError, TokenIssuer};

pub use apply_log::ApplyLog;
pub use batch::{BatchResult, CancelFlag, ItemError, ItemFailure};

/// Pre-batch failures: the request itself was rejected and no image was
/// touched. Distinct from per-item failures recorded in a [`BatchResult`].
#[derive(Debug)]
pub enum BatchError {
    /// Token validation failed
    Auth(TokenError),
    /// The request's definition does not resolve
    DefinitionNotFound(DefinitionId),
    /// Definition store rejected the request (autosave only)
    Store(StoreError),
    /// Image access failed (preview only)
    Image(ImageStoreError),
    /// Render failed (preview only)
    Render(RenderError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(err) => write!(f, "Request not authorized: {}", err),
            Self::DefinitionNotFound(id) => write!(f, "Watermark definition not found: {}", id),
            Self::Store(err) => write!(f, "{}", err),
            Self::Image(err) => write!(f, "{}", err),
            Self::Render(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BatchError {}

impl From<TokenError> for BatchError {
    fn from(err: TokenError) -> Self {
        Self::Auth(err)
    }
}

/// Orchestrates authorized bulk apply/restore operations.
pub struct Coordinator {
    issuer: Arc<TokenIssuer>,
    definitions: Arc<DefinitionStore>,
    backups: Arc<BackupManager>,
    engine: Arc<dyn RenderEngine>,
    images: Arc<dyn ImageStore>,
    config: EngineConfig,
    apply_log: ApplyLog,
}

impl Coordinator {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        definitions: Arc<DefinitionStore>,
        backups: Arc<BackupManager>,
        engine: Arc<dyn RenderEngine>,
        images: Arc<dyn ImageStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            issuer,
            definitions,
            backups,
            engine,
            images,
            config,
            apply_log: ApplyLog::new(),
        }
    }

    /// Apply best-fit published definitions across a batch of images.
    ///
    /// Definitions are resolved per image by mime filtering, re-read from
    /// the store for every item: a definition edited mid-batch affects
    /// subsequent items, never already-processed ones.
    pub async fn apply_all(
        &self,
        ctx: &OperationContext,
        image_ids: &[ImageId],
        token: &str,
        cancel: &CancelFlag,
    ) -> Result<BatchResult, BatchError> {
        self.issuer.validate(ctx, token, Purpose::ApplyAll)?;
        tracing::info!(
            request_id = ctx.request_id(),
            total = image_ids.len(),
            "starting bulk watermark apply"
        );

        let mut result = BatchResult::new(image_ids.len());
        for (idx, image_id) in image_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                self.mark_remaining_skipped(&mut result, &image_ids[idx..], ctx);
                break;
            }

            match self.apply_best_fit(image_id).await {
                Ok(()) => result.record_success(),
                Err(error) => {
                    tracing::warn!(
                        request_id = ctx.request_id(),
                        image_id = %image_id,
                        error = %error,
                        "watermark apply failed for image"
                    );
                    result.record_failure(image_id.clone(), error);
                }
            }
        }

        self.log_batch_end(ctx, "bulk watermark apply", &result);
        Ok(result)
    }

    /// Apply one specific definition across a batch of images, bypassing
    /// mime heuristics.
    ///
    /// The definition is resolved once, before any image is touched; an
    /// unknown or trashed definition aborts the whole call.
    pub async fn apply_single(
        &self,
        ctx: &OperationContext,
        image_ids: &[ImageId],
        definition_id: DefinitionId,
        token: &str,
        cancel: &CancelFlag,
    ) -> Result<BatchResult, BatchError> {
        self.issuer
            .validate(ctx, token, Purpose::ApplySingle(definition_id))?;

        let definition = self
            .definitions
            .get(definition_id)
            .map_err(|_| BatchError::DefinitionNotFound(definition_id))?;
        if definition.status == DefinitionStatus::Trashed {
            return Err(BatchError::DefinitionNotFound(definition_id));
        }

        tracing::info!(
            request_id = ctx.request_id(),
            definition_id = %definition_id,
            total = image_ids.len(),
            "starting single-definition apply"
        );

        let mut result = BatchResult::new(image_ids.len());
        for (idx, image_id) in image_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                self.mark_remaining_skipped(&mut result, &image_ids[idx..], ctx);
                break;
            }

            match self.apply_definition(image_id, &definition).await {
                Ok(()) => result.record_success(),
                Err(error) => {
                    tracing::warn!(
                        request_id = ctx.request_id(),
                        image_id = %image_id,
                        error = %error,
                        "watermark apply failed for image"
                    );
                    result.record_failure(image_id.clone(), error);
                }
            }
        }

        self.log_batch_end(ctx, "single-definition apply", &result);
        Ok(result)
    }

    /// Restore original bytes across a batch of images.
    ///
    /// An image with no backup is a per-item failure, never a batch abort.
    pub async fn restore_all(
        &self,
        ctx: &OperationContext,
        image_ids: &[ImageId],
        token: &str,
        cancel: &CancelFlag,
    ) -> Result<BatchResult, BatchError> {
        self.issuer.validate(ctx, token, Purpose::RestoreBackup)?;
        tracing::info!(
            request_id = ctx.request_id(),
            total = image_ids.len(),
            "starting bulk restore"
        );

        let mut result = BatchResult::new(image_ids.len());
        for (idx, image_id) in image_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                self.mark_remaining_skipped(&mut result, &image_ids[idx..], ctx);
                break;
            }

            match self.backups.restore(image_id).await {
                Ok(()) => {
                    self.apply_log.clear(image_id);
                    result.record_success();
                }
                Err(error) => {
                    tracing::warn!(
                        request_id = ctx.request_id(),
                        image_id = %image_id,
                        error = %error,
                        "restore failed for image"
                    );
                    result.record_failure(image_id.clone(), error.into());
                }
            }
        }

        self.log_batch_end(ctx, "bulk restore", &result);
        Ok(result)
    }

    /// Render a preview of one definition on one image.
    ///
    /// Nothing is persisted: no backup is taken and no bytes are written.
    pub async fn preview(
        &self,
        ctx: &OperationContext,
        image_id: &ImageId,
        definition_id: DefinitionId,
        token: &str,
    ) -> Result<Bytes, BatchError> {
        self.issuer.validate(ctx, token, Purpose::Preview)?;

        let definition = self
            .definitions
            .get(definition_id)
            .map_err(|_| BatchError::DefinitionNotFound(definition_id))?;

        let bytes = self
            .images
            .read_bytes(image_id)
            .await
            .map_err(BatchError::Image)?;
        self.engine
            .render(&bytes, &definition.params)
            .await
            .map_err(BatchError::Render)
    }

    /// Autosave scratch params for a definition being edited.
    ///
    /// The committed record is untouched; the store keeps the scratch copy
    /// until the next full update.
    pub fn autosave(
        &self,
        ctx: &OperationContext,
        definition_id: DefinitionId,
        params: WatermarkParams,
        token: &str,
    ) -> Result<(), BatchError> {
        self.issuer.validate(ctx, token, Purpose::Autosave)?;

        self.definitions
            .autosave(definition_id, params)
            .map_err(|err| match err {
                StoreError::NotFound(id) => BatchError::DefinitionNotFound(id),
                other => BatchError::Store(other),
            })
    }

    /// Definitions currently applied to an image, in application order.
    pub fn applied_definitions(&self, image_id: &ImageId) -> Vec<DefinitionId> {
        self.apply_log.applied_definitions(image_id)
    }

    async fn apply_best_fit(&self, image_id: &ImageId) -> Result<(), ItemError> {
        let bytes = self.images.read_bytes(image_id).await?;

        let mime = detect_mime(&bytes)
            .filter(|m| self.config.mime_allowed(m))
            .ok_or(ItemError::UnsupportedMime)?;

        let definitions = self.definitions.matching(mime);
        if definitions.is_empty() {
            return Err(ItemError::NoMatchingDefinition);
        }

        let pending: Vec<WatermarkDefinition> = definitions
            .into_iter()
            .filter(|d| !self.apply_log.is_applied(image_id, d.id))
            .collect();
        if pending.is_empty() {
            // Everything that matches is already stamped on this image
            return Ok(());
        }

        self.render_and_write(image_id, bytes, &pending).await
    }

    async fn apply_definition(
        &self,
        image_id: &ImageId,
        definition: &WatermarkDefinition,
    ) -> Result<(), ItemError> {
        if self.apply_log.is_applied(image_id, definition.id) {
            return Ok(());
        }

        let bytes = self.images.read_bytes(image_id).await?;
        self.render_and_write(image_id, bytes, std::slice::from_ref(definition))
            .await
    }

    async fn render_and_write(
        &self,
        image_id: &ImageId,
        bytes: Bytes,
        definitions: &[WatermarkDefinition],
    ) -> Result<(), ItemError> {
        // Snapshot originals before the first modification
        self.backups.ensure_backup(image_id).await?;

        let mut current = bytes;
        for definition in definitions {
            current = self.engine.render(&current, &definition.params).await?;
        }
        self.images.write_bytes(image_id, current).await?;

        for definition in definitions {
            self.apply_log.record(image_id.clone(), definition.id);
        }
        Ok(())
    }

    fn mark_remaining_skipped(
        &self,
        result: &mut BatchResult,
        remaining: &[ImageId],
        ctx: &OperationContext,
    ) {
        for image_id in remaining {
            result.record_skipped(image_id.clone());
        }
        tracing::info!(
            request_id = ctx.request_id(),
            processed = result.processed,
            skipped = result.skipped.len(),
            "batch cancelled by caller"
        );
    }

    fn log_batch_end(&self, ctx: &OperationContext, operation: &str, result: &BatchResult) {
        tracing::info!(
            request_id = ctx.request_id(),
            operation = operation,
            total = result.total,
            processed = result.processed,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped.len(),
            "batch finished"
        );
    }
}
