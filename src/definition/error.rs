//! Error types for the definition store.

use thiserror::Error;

use super::store::{DefinitionId, RestrictedOp};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("watermark definition not found: {0}")]
    NotFound(DefinitionId),

    #[error("definition quota reached: creation is blocked by deployment policy")]
    QuotaExceeded,

    #[error("definition is in restricted mode: {0} is blocked by the publish quota")]
    QuotaRestricted(RestrictedOp),

    #[error("params serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported params schema version {0}")]
    UnsupportedSchema(u32),

    #[error("invalid params: {0}")]
    InvalidParams(String),
}
