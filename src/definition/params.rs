//! Watermark overlay parameters and their serialization contract.
//!
//! Parameters are owned by the rendering engine semantically, but the
//! definition store owns their serialized form: every record carries a
//! versioned JSON envelope (`schema_version` + params body) that is written
//! and read atomically with the rest of the record.

use serde::{Deserialize, Serialize};

use super::error::StoreError;

/// Current params envelope schema version.
pub const PARAMS_SCHEMA_VERSION: u32 = 1;

// Default values
fn default_font_size() -> u32 {
    24
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

fn default_opacity() -> f32 {
    0.5
}

fn default_margin() -> u32 {
    10
}

/// Overlay position on the target image (9-grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Watermark overlay parameters - either text or image.
///
/// Uses a serde tag to distinguish the two overlay types:
/// ```json
/// {"type": "text", "text": "Preview", "position": "bottom-right"}
/// {"type": "image", "source": "logo.png", "position": "top-left"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatermarkParams {
    Text(TextParams),
    Image(ImageParams),
}

/// Text overlay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextParams {
    /// Text content to draw over the image
    pub text: String,

    /// Font size in pixels (default: 24)
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Text color as hex string (default: "#FFFFFF")
    #[serde(default = "default_color")]
    pub color: String,

    /// Opacity from 0.0 (transparent) to 1.0 (opaque) (default: 0.5)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Position on the image
    pub position: OverlayPosition,

    /// Margin from edge in pixels (default: 10)
    #[serde(default = "default_margin")]
    pub margin: u32,

    /// Rotation angle in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<i16>,

    /// Repeat the overlay as a tile pattern across the whole image
    #[serde(default)]
    pub tiled: bool,

    /// Mime types this overlay applies to; empty means every allowed type
    #[serde(default)]
    pub mime_types: Vec<String>,
}

/// Image overlay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageParams {
    /// Overlay image source (a path or key resolvable by the render engine)
    pub source: String,

    /// Resize width in pixels (maintains aspect ratio if height not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Resize height in pixels (maintains aspect ratio if width not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Opacity from 0.0 (transparent) to 1.0 (opaque) (default: 0.5)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Position on the image
    pub position: OverlayPosition,

    /// Margin from edge in pixels (default: 10)
    #[serde(default = "default_margin")]
    pub margin: u32,

    /// Rotation angle in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<i16>,

    /// Repeat the overlay as a tile pattern across the whole image
    #[serde(default)]
    pub tiled: bool,

    /// Mime types this overlay applies to; empty means every allowed type
    #[serde(default)]
    pub mime_types: Vec<String>,
}

fn validate_opacity(opacity: f32, kind: &str) -> Result<(), String> {
    // Check for NaN/Infinity and valid range
    if !opacity.is_finite() || !(0.0..=1.0).contains(&opacity) {
        return Err(format!(
            "{} watermark opacity must be a finite value between 0.0 and 1.0, got {}",
            kind, opacity
        ));
    }
    Ok(())
}

impl TextParams {
    /// Validate the text overlay parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("Text watermark 'text' field cannot be empty".to_string());
        }

        validate_opacity(self.opacity, "Text")?;

        // Validate hex color format (#RGB or #RRGGBB)
        if let Some(hex_part) = self.color.strip_prefix('#') {
            let len = hex_part.len();
            if (len != 3 && len != 6) || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!(
                    "Text watermark color must be in #RGB or #RRGGBB format with valid hex characters, got '{}'",
                    self.color
                ));
            }
        } else {
            return Err(format!(
                "Text watermark color must be a hex string starting with '#', got '{}'",
                self.color
            ));
        }

        Ok(())
    }
}

impl ImageParams {
    /// Validate the image overlay parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.is_empty() {
            return Err("Image watermark 'source' field cannot be empty".to_string());
        }

        validate_opacity(self.opacity, "Image")?;

        Ok(())
    }
}

impl WatermarkParams {
    /// Validate the overlay parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Text(params) => params.validate(),
            Self::Image(params) => params.validate(),
        }
    }

    /// Whether this overlay applies to images of the given mime type.
    /// An empty filter accepts every type.
    pub fn accepts_mime(&self, mime: &str) -> bool {
        let filter = match self {
            Self::Text(params) => &params.mime_types,
            Self::Image(params) => &params.mime_types,
        };
        filter.is_empty() || filter.iter().any(|m| m == mime)
    }

    /// Overlay kind as a short string ("text" or "image").
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
        }
    }
}

/// Versioned serialization envelope for overlay parameters.
#[derive(Debug, Serialize, Deserialize)]
struct ParamsEnvelope {
    schema_version: u32,
    params: WatermarkParams,
}

/// Serialize params into the versioned envelope stored on a definition record.
pub fn encode_params(params: &WatermarkParams) -> Result<String, StoreError> {
    let envelope = ParamsEnvelope {
        schema_version: PARAMS_SCHEMA_VERSION,
        params: params.clone(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Deserialize params from a stored envelope, rejecting unknown schema versions.
pub fn decode_params(blob: &str) -> Result<WatermarkParams, StoreError> {
    let envelope: ParamsEnvelope = serde_json::from_str(blob)?;
    if envelope.schema_version != PARAMS_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema(envelope.schema_version));
    }
    Ok(envelope.params)
}
