//! Operation token issuer.
//!
//! Every engine operation (bulk apply, single apply, restore, autosave,
//! preview) is authorized by a purpose-bound token. The chosen model is a
//! hybrid:
//!
//! - Tokens are self-verifying: a JSON payload (purpose, actor, jti,
//!   issued-at, expiry) signed with HMAC-SHA256. Authenticity and TTL need
//!   no server-side state.
//! - Single use is enforced by an in-process consumed-jti ledger, so
//!   re-presenting a token inside its TTL window is rejected. Across
//!   restarts the short TTL is the backstop.
//!
//! Wire form: `base64url(payload_json) + "." + hex(hmac_sha256(payload_json))`

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::OperationContext;
use crate::definition::DefinitionId;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_SCHEMA_VERSION: u32 = 1;

/// The single operation class a token authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purpose {
    /// Apply best-fit published definitions across a batch
    ApplyAll,
    /// Apply one specific definition across a batch
    ApplySingle(DefinitionId),
    /// Restore original bytes from backups
    RestoreBackup,
    /// Autosave scratch params while editing a definition
    Autosave,
    /// Render a preview without persisting anything
    Preview,
}

impl Purpose {
    /// Encode the purpose for the token payload.
    pub fn to_wire(&self) -> String {
        match self {
            Self::ApplyAll => "apply-all".to_string(),
            Self::ApplySingle(id) => format!("apply-single:{}", id),
            Self::RestoreBackup => "restore-backup".to_string(),
            Self::Autosave => "autosave".to_string(),
            Self::Preview => "preview".to_string(),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

/// Token issuance and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Issuance requires an actor; the context has none
    NoActorContext,
    /// Token wire form or payload could not be parsed
    Malformed(String),
    /// HMAC signature does not match the payload
    InvalidSignature,
    /// Token is past its expiry
    Expired,
    /// Token jti was already validated once
    AlreadyConsumed,
    /// Token was issued for a different purpose
    PurposeMismatch { expected: String, found: String },
    /// Token was issued to a different actor
    ActorMismatch,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActorContext => write!(f, "No actor context available for token issuance"),
            Self::Malformed(msg) => write!(f, "Malformed token: {}", msg),
            Self::InvalidSignature => write!(f, "Invalid token signature"),
            Self::Expired => write!(f, "Token expired"),
            Self::AlreadyConsumed => write!(f, "Token already consumed"),
            Self::PurposeMismatch { expected, found } => {
                write!(
                    f,
                    "Token purpose mismatch: expected '{}', found '{}'",
                    expected, found
                )
            }
            Self::ActorMismatch => write!(f, "Token bound to a different actor"),
        }
    }
}

impl std::error::Error for TokenError {}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    v: u32,
    jti: String,
    actor: String,
    purpose: String,
    iat: u64,
    exp: u64,
}

/// Mints and validates purpose-bound, single-use operation tokens.
pub struct TokenIssuer {
    key: Vec<u8>,
    ttl_seconds: u64,
    // jti -> exp, pruned opportunistically on validate
    consumed: Mutex<HashMap<String, u64>>,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_seconds: u64) -> Self {
        Self {
            key: secret.into(),
            ttl_seconds,
            consumed: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.token_secret.as_bytes().to_vec(), config.token_ttl_seconds)
    }

    /// Mint a token bound to the context's actor and the given purpose.
    pub fn issue(&self, ctx: &OperationContext, purpose: Purpose) -> Result<String, TokenError> {
        let actor = ctx.actor().ok_or(TokenError::NoActorContext)?;

        let now = now_epoch_secs();
        let payload = TokenPayload {
            v: TOKEN_SCHEMA_VERSION,
            jti: Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            purpose: purpose.to_wire(),
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let payload_json =
            serde_json::to_vec(&payload).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let signature = hex::encode(hmac_sha256(&self.key, &payload_json));

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload_json),
            signature
        ))
    }

    /// Validate a token for the given purpose and actor context.
    ///
    /// Successful validation consumes the token: a second validation of the
    /// same token fails with `AlreadyConsumed`.
    pub fn validate(
        &self,
        ctx: &OperationContext,
        token: &str,
        purpose: Purpose,
    ) -> Result<(), TokenError> {
        let (encoded_payload, signature_hex) = token
            .split_once('.')
            .ok_or_else(|| TokenError::Malformed("missing signature separator".to_string()))?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(encoded_payload)
            .map_err(|e| TokenError::Malformed(format!("payload encoding: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC can take key of any size");
        mac.update(&payload_json);
        let signature = hex::decode(signature_hex)
            .map_err(|e| TokenError::Malformed(format!("signature encoding: {}", e)))?;
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload: TokenPayload = serde_json::from_slice(&payload_json)
            .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))?;

        if payload.v != TOKEN_SCHEMA_VERSION {
            return Err(TokenError::Malformed(format!(
                "unknown token version {}",
                payload.v
            )));
        }

        let now = now_epoch_secs();
        if now >= payload.exp {
            return Err(TokenError::Expired);
        }

        let expected = purpose.to_wire();
        if payload.purpose != expected {
            return Err(TokenError::PurposeMismatch {
                expected,
                found: payload.purpose,
            });
        }

        match ctx.actor() {
            Some(actor) if actor == payload.actor => {}
            _ => return Err(TokenError::ActorMismatch),
        }

        let mut consumed = self.consumed.lock();
        consumed.retain(|_, exp| *exp > now);
        if consumed.contains_key(&payload.jti) {
            return Err(TokenError::AlreadyConsumed);
        }
        consumed.insert(payload.jti, payload.exp);

        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
