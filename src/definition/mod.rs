//! Watermark definition store.
//!
//! Definitions are named, parameterized overlay specifications applied to
//! media-library images. This module provides:
//!
//! - **Params model** with text and image overlay types, positions, opacity,
//!   rotation, tiling and mime filtering
//! - **Versioned serialization contract** for params (JSON envelope with a
//!   `schema_version` field, committed atomically with the record)
//! - **Quota invariant**: once the published count reaches the configured
//!   threshold, non-published definitions enter restricted mode and
//!   structural mutations are denied through one predicate
//! - **Trash lifecycle** with a quota-aware untrash whose denial is
//!   distinguishable from success

pub mod error;
pub mod params;
pub mod store;

pub use error::StoreError;
pub use params::{
    decode_params, encode_params, ImageParams, OverlayPosition, TextParams, WatermarkParams,
    PARAMS_SCHEMA_VERSION,
};
pub use store::{
    DefinitionId, DefinitionStatus, DefinitionStore, RestrictedOp, UntrashOutcome,
    WatermarkDefinition,
};
