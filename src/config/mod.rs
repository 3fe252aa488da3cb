//! Engine configuration types.
//!
//! This module defines the configuration for the watermark engine:
//! - Publish quota threshold governing restricted mode
//! - Operation token secret and TTL
//! - Mime types eligible for watermarking
//!
//! Configuration can be loaded from YAML or built in code. All fields except
//! the token secret carry defaults; `validate()` rejects configurations that
//! would leave the engine unable to authorize requests.

use serde::{Deserialize, Serialize};

fn default_quota_threshold() -> usize {
    2
}

fn default_token_ttl_seconds() -> u64 {
    300
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

/// Engine configuration.
///
/// The quota threshold controls how many definitions may be published before
/// non-published definitions fall into restricted mode (edit, untrash, column
/// layout and title support denied).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Published-definition count at which restricted mode kicks in (default: 2)
    #[serde(default = "default_quota_threshold")]
    pub quota_threshold: usize,

    /// Whether creating new definitions is also blocked once the quota is
    /// reached. By default creation stays open; only structural edits are
    /// restricted.
    #[serde(default)]
    pub block_creation_over_quota: bool,

    /// HMAC secret for operation tokens.
    ///
    /// Defaults to an empty string for deserialization; `validate()` rejects
    /// empty secrets.
    #[serde(default)]
    pub token_secret: String,

    /// Operation token lifetime in seconds (default: 300)
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,

    /// Mime types eligible for watermarking (default: jpeg, png, gif, webp)
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quota_threshold: default_quota_threshold(),
            block_creation_over_quota: false,
            token_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let config: EngineConfig =
            serde_yaml::from_str(yaml).map_err(|e| format!("Invalid YAML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_secret.is_empty() {
            return Err("token_secret cannot be empty".to_string());
        }

        if self.token_ttl_seconds == 0 {
            return Err("token_ttl_seconds must be greater than zero".to_string());
        }

        if self.quota_threshold == 0 {
            return Err("quota_threshold must be greater than zero".to_string());
        }

        if self.allowed_mime_types.is_empty() {
            return Err("allowed_mime_types cannot be empty".to_string());
        }

        for mime in &self.allowed_mime_types {
            if !mime.starts_with("image/") {
                return Err(format!(
                    "allowed_mime_types entries must be image mime types, got '{}'",
                    mime
                ));
            }
        }

        Ok(())
    }

    /// Whether the given mime type is eligible for watermarking.
    pub fn mime_allowed(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime)
    }
}
