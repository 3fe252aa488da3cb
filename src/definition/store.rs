//! In-memory watermark definition store with quota enforcement.
//!
//! The store owns the full definition lifecycle:
//! - create / get / list / update with atomic params serialization
//! - publish / unpublish / trash / untrash
//! - autosave scratch params kept apart from the committed record
//!
//! The quota invariant lives here: once `count_published()` reaches the
//! configured threshold, every non-published definition is in restricted
//! mode and structural mutations (edit, untrash, column layout, title
//! support) are denied through the single `restricted_mode` predicate.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;

use super::error::StoreError;
use super::params::{decode_params, encode_params, WatermarkParams};

/// Stable identifier of a watermark definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(Uuid);

impl DefinitionId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DefinitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionStatus {
    Draft,
    Published,
    Trashed,
}

impl DefinitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Trashed => "trashed",
        }
    }
}

/// Quota-gated mutation kinds, dispatched through `restricted_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedOp {
    Edit,
    Untrash,
    ColumnLayout,
    TitleSupport,
}

impl fmt::Display for RestrictedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit => write!(f, "edit"),
            Self::Untrash => write!(f, "untrash"),
            Self::ColumnLayout => write!(f, "column layout"),
            Self::TitleSupport => write!(f, "title support"),
        }
    }
}

/// Outcome of an untrash request.
///
/// `BlockedByQuota` is deliberately a success-shaped value: the caller must
/// surface an explicit "restore blocked" notice instead of the generic
/// "restored" one, so the denial cannot be silently folded into a success
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrashOutcome {
    /// Definition returned to draft
    Restored,
    /// Denied by the publish quota; status and counts unchanged
    BlockedByQuota,
    /// Definition was not in the trash; nothing changed
    NotTrashed,
}

/// Materialized view of a stored definition.
#[derive(Debug, Clone)]
pub struct WatermarkDefinition {
    pub id: DefinitionId,
    pub title: String,
    pub status: DefinitionStatus,
    pub params: WatermarkParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Internal record; params live as a versioned serialized envelope.
#[derive(Debug, Clone)]
struct DefinitionRecord {
    id: DefinitionId,
    title: String,
    status: DefinitionStatus,
    params_blob: String,
    autosave_blob: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DefinitionRecord {
    fn materialize(&self) -> Result<WatermarkDefinition, StoreError> {
        Ok(WatermarkDefinition {
            id: self.id,
            title: self.title.clone(),
            status: self.status,
            params: decode_params(&self.params_blob)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// In-memory definition store. Insertion order is preserved for listings.
pub struct DefinitionStore {
    records: RwLock<Vec<DefinitionRecord>>,
    quota_threshold: usize,
    block_creation_over_quota: bool,
}

impl DefinitionStore {
    /// Create an empty store using the engine's quota settings.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            quota_threshold: config.quota_threshold,
            block_creation_over_quota: config.block_creation_over_quota,
        }
    }

    /// Create a new draft definition.
    ///
    /// Creation is open by default; only the `block_creation_over_quota`
    /// deployment policy makes it fail once the quota is reached.
    pub fn create(
        &self,
        title: impl Into<String>,
        params: WatermarkParams,
    ) -> Result<WatermarkDefinition, StoreError> {
        params.validate().map_err(StoreError::InvalidParams)?;
        let blob = encode_params(&params)?;

        let mut records = self.records.write();
        if self.block_creation_over_quota
            && count_published(&records) >= self.quota_threshold
        {
            return Err(StoreError::QuotaExceeded);
        }

        let now = Utc::now();
        let record = DefinitionRecord {
            id: DefinitionId::new(),
            title: title.into(),
            status: DefinitionStatus::Draft,
            params_blob: blob,
            autosave_blob: None,
            created_at: now,
            updated_at: now,
        };
        let view = record.materialize()?;
        records.push(record);

        tracing::debug!(definition_id = %view.id, title = %view.title, "created watermark definition");
        Ok(view)
    }

    /// Fetch a definition by id.
    pub fn get(&self, id: DefinitionId) -> Result<WatermarkDefinition, StoreError> {
        let records = self.records.read();
        records
            .iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?
            .materialize()
    }

    /// List definitions in insertion order, optionally filtered by status.
    pub fn list(&self, filter: Option<DefinitionStatus>) -> Vec<WatermarkDefinition> {
        let records = self.records.read();
        records
            .iter()
            .filter(|r| filter.map_or(true, |s| r.status == s))
            .filter_map(|r| r.materialize().ok())
            .collect()
    }

    /// Update a definition's title and params.
    ///
    /// The params envelope is re-serialized and committed together with the
    /// record fields under one write lock. Any pending autosave is dropped.
    pub fn update(
        &self,
        id: DefinitionId,
        title: impl Into<String>,
        params: WatermarkParams,
    ) -> Result<(), StoreError> {
        params.validate().map_err(StoreError::InvalidParams)?;
        let blob = encode_params(&params)?;

        let mut records = self.records.write();
        let published = count_published(&records);
        let record = find_mut(&mut records, id)?;

        if restricted(record.status, published, self.quota_threshold) {
            return Err(StoreError::QuotaRestricted(RestrictedOp::Edit));
        }

        record.title = title.into();
        record.params_blob = blob;
        record.autosave_blob = None;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Publish a definition. Denied for restricted definitions.
    pub fn publish(&self, id: DefinitionId) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let published = count_published(&records);
        let record = find_mut(&mut records, id)?;

        if record.status == DefinitionStatus::Published {
            return Ok(());
        }
        if restricted(record.status, published, self.quota_threshold) {
            return Err(StoreError::QuotaRestricted(RestrictedOp::Edit));
        }

        record.status = DefinitionStatus::Published;
        record.updated_at = Utc::now();
        tracing::info!(definition_id = %id, "published watermark definition");
        Ok(())
    }

    /// Unpublish a definition back to draft. Always allowed.
    pub fn unpublish(&self, id: DefinitionId) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = find_mut(&mut records, id)?;
        if record.status == DefinitionStatus::Published {
            record.status = DefinitionStatus::Draft;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Move a definition to the trash. Always allowed; a published
    /// definition loses its published status.
    pub fn trash(&self, id: DefinitionId) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = find_mut(&mut records, id)?;
        record.status = DefinitionStatus::Trashed;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Restore a definition from the trash.
    ///
    /// A restricted definition's untrash is force-denied with
    /// `UntrashOutcome::BlockedByQuota`; the published count is unchanged
    /// and the caller must not report a generic "restored" notice.
    pub fn untrash(&self, id: DefinitionId) -> Result<UntrashOutcome, StoreError> {
        let mut records = self.records.write();
        let published = count_published(&records);
        let threshold = self.quota_threshold;
        let record = find_mut(&mut records, id)?;

        if record.status != DefinitionStatus::Trashed {
            return Ok(UntrashOutcome::NotTrashed);
        }
        if restricted(record.status, published, threshold) {
            tracing::warn!(definition_id = %id, "untrash blocked by publish quota");
            return Ok(UntrashOutcome::BlockedByQuota);
        }

        record.status = DefinitionStatus::Draft;
        record.updated_at = Utc::now();
        Ok(UntrashOutcome::Restored)
    }

    /// Number of currently published definitions.
    pub fn count_published(&self) -> usize {
        count_published(&self.records.read())
    }

    /// Whether the given definition is in restricted mode for the given
    /// mutation kind.
    ///
    /// True when the published count has reached the quota threshold and the
    /// definition itself is not published. Edit screens, untrash, column
    /// layout and title support all consult this before mutating.
    pub fn restricted_mode(&self, definition: &WatermarkDefinition, op: RestrictedOp) -> bool {
        let is_restricted = restricted(
            definition.status,
            self.count_published(),
            self.quota_threshold,
        );
        if is_restricted {
            tracing::debug!(definition_id = %definition.id, op = %op, "definition is quota-restricted");
        }
        is_restricted
    }

    /// Store autosaved scratch params for a definition without touching the
    /// committed record. Overwritten by each call; dropped by `update`.
    pub fn autosave(&self, id: DefinitionId, params: WatermarkParams) -> Result<(), StoreError> {
        params.validate().map_err(StoreError::InvalidParams)?;
        let blob = encode_params(&params)?;

        let mut records = self.records.write();
        let published = count_published(&records);
        let record = find_mut(&mut records, id)?;

        if restricted(record.status, published, self.quota_threshold) {
            return Err(StoreError::QuotaRestricted(RestrictedOp::Edit));
        }

        record.autosave_blob = Some(blob);
        Ok(())
    }

    /// Read the autosaved scratch params, if any.
    pub fn autosaved_params(
        &self,
        id: DefinitionId,
    ) -> Result<Option<WatermarkParams>, StoreError> {
        let records = self.records.read();
        let record = records
            .iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record
            .autosave_blob
            .as_deref()
            .map(decode_params)
            .transpose()
    }

    /// Published definitions whose mime filter accepts the given type,
    /// in insertion order. Drives best-fit bulk application.
    pub fn matching(&self, mime: &str) -> Vec<WatermarkDefinition> {
        self.list(Some(DefinitionStatus::Published))
            .into_iter()
            .filter(|d| d.params.accepts_mime(mime))
            .collect()
    }
}

fn count_published(records: &[DefinitionRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.status == DefinitionStatus::Published)
        .count()
}

fn restricted(status: DefinitionStatus, published: usize, threshold: usize) -> bool {
    published >= threshold && status != DefinitionStatus::Published
}

fn find_mut(
    records: &mut [DefinitionRecord],
    id: DefinitionId,
) -> Result<&mut DefinitionRecord, StoreError> {
    records
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(StoreError::NotFound(id))
}
