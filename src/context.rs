// Operation context - explicit per-request state passed into each operation

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Context for a single engine operation.
///
/// Carries the acting user and a unique request id through token issuance,
/// validation and batch processing. Built fresh at the request boundary;
/// nothing in the engine reads ambient global state.
#[derive(Debug, Clone)]
pub struct OperationContext {
    request_id: String,
    actor: Option<String>,
    timestamp: u64,
}

impl OperationContext {
    /// Create a context for an authenticated actor.
    /// Automatically generates a unique request ID (UUID v4) and captures current timestamp.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor: Some(actor.into()),
            timestamp: now_epoch_secs(),
        }
    }

    /// Create a context with no actor (e.g. internal maintenance calls).
    /// Token issuance requires an actor and will reject this context.
    pub fn anonymous() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor: None,
            timestamp: now_epoch_secs(),
        }
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Get the acting user, if any
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Get the request timestamp (Unix epoch seconds)
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
