//! Request surface exposed to the admin UI layer.
//!
//! Four logical operations, each gated by a purpose-matched token:
//! `apply_all`, `apply_single`, `restore_backup`, plus the read-only
//! `list_definitions`. Requests and responses are serde DTOs with camelCase
//! JSON field names; batch outcomes serialize as
//! `{total, processed, succeeded, failed, errors: [{imageId, message}]}`.
//!
//! A rejected request (bad token, unknown definition) surfaces as an error
//! before any image is touched, distinguishable from a batch that ran with
//! per-item failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::OperationContext;
use crate::coordinator::{BatchError, BatchResult, CancelFlag, Coordinator};
use crate::definition::{DefinitionId, DefinitionStatus, DefinitionStore};
use crate::media::ImageId;

/// Bulk apply request using best-fit definition resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyAllRequest {
    pub image_ids: Vec<String>,
    pub token: String,
}

/// Bulk apply request forcing one definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySingleRequest {
    pub image_ids: Vec<String>,
    pub definition_id: DefinitionId,
    pub token: String,
}

/// Bulk restore request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub image_ids: Vec<String>,
    pub token: String,
}

/// One failed item in a batch response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponseError {
    pub image_id: String,
    pub message: String,
}

/// Aggregate batch outcome returned to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BatchResponseError>,
}

impl From<&BatchResult> for BatchResponse {
    fn from(result: &BatchResult) -> Self {
        Self {
            total: result.total,
            processed: result.processed,
            succeeded: result.succeeded,
            failed: result.failed,
            errors: result
                .failures
                .iter()
                .map(|f| BatchResponseError {
                    image_id: f.image_id.to_string(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Read-only definition listing entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSummary {
    pub id: DefinitionId,
    pub title: String,
    pub status: DefinitionStatus,
}

/// Thin facade mapping UI requests onto the coordinator and store.
pub struct WatermarkService {
    coordinator: Arc<Coordinator>,
    definitions: Arc<DefinitionStore>,
}

impl WatermarkService {
    pub fn new(coordinator: Arc<Coordinator>, definitions: Arc<DefinitionStore>) -> Self {
        Self {
            coordinator,
            definitions,
        }
    }

    pub async fn apply_all(
        &self,
        ctx: &OperationContext,
        request: ApplyAllRequest,
        cancel: &CancelFlag,
    ) -> Result<BatchResponse, BatchError> {
        let image_ids = to_image_ids(&request.image_ids);
        let result = self
            .coordinator
            .apply_all(ctx, &image_ids, &request.token, cancel)
            .await?;
        Ok(BatchResponse::from(&result))
    }

    pub async fn apply_single(
        &self,
        ctx: &OperationContext,
        request: ApplySingleRequest,
        cancel: &CancelFlag,
    ) -> Result<BatchResponse, BatchError> {
        let image_ids = to_image_ids(&request.image_ids);
        let result = self
            .coordinator
            .apply_single(
                ctx,
                &image_ids,
                request.definition_id,
                &request.token,
                cancel,
            )
            .await?;
        Ok(BatchResponse::from(&result))
    }

    pub async fn restore_backup(
        &self,
        ctx: &OperationContext,
        request: RestoreRequest,
        cancel: &CancelFlag,
    ) -> Result<BatchResponse, BatchError> {
        let image_ids = to_image_ids(&request.image_ids);
        let result = self
            .coordinator
            .restore_all(ctx, &image_ids, &request.token, cancel)
            .await?;
        Ok(BatchResponse::from(&result))
    }

    /// List definitions, optionally filtered by status. Requires no token.
    pub fn list_definitions(&self, filter: Option<DefinitionStatus>) -> Vec<DefinitionSummary> {
        self.definitions
            .list(filter)
            .into_iter()
            .map(|d| DefinitionSummary {
                id: d.id,
                title: d.title,
                status: d.status,
            })
            .collect()
    }
}

fn to_image_ids(ids: &[String]) -> Vec<ImageId> {
    ids.iter().map(|id| ImageId::new(id.clone())).collect()
}
