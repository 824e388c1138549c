//! Parameter types for photo compression.
//!
//! - [`OutputFormat`]: target encoding and its MIME type.
//! - [`CompressionOptions`]: bounds, quality in [0, 1], format and aspect handling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fl_core::config::CompressionConfig;
use fl_core::constants::compression as defaults;
use fl_core::error::FlError;

/// Encoding produced by the compression pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    /// Whether the format cannot carry transparency.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl FromStr for OutputFormat {
    type Err = FlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(Self::Jpeg),
            "png" | "image/png" => Ok(Self::Png),
            "webp" | "image/webp" => Ok(Self::WebP),
            other => Err(FlError::Config(format!("unsupported output format '{other}'"))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        })
    }
}

/// How to compress one photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in [0, 1]. Out-of-range values are clamped.
    pub quality: f32,
    pub format: OutputFormat,
    pub maintain_aspect_ratio: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: defaults::DEFAULT_MAX_WIDTH,
            max_height: defaults::DEFAULT_MAX_HEIGHT,
            quality: defaults::DEFAULT_QUALITY,
            format: OutputFormat::Jpeg,
            maintain_aspect_ratio: true,
        }
    }
}

impl CompressionOptions {
    /// Options from the `[compression]` config section.
    pub fn from_config(config: &CompressionConfig) -> Result<Self, FlError> {
        Ok(Self {
            max_width: config.max_width,
            max_height: config.max_height,
            quality: config.quality,
            format: config.format.parse()?,
            maintain_aspect_ratio: config.maintain_aspect_ratio,
        })
    }

    /// Quality clamped to [0, 1]; NaN falls back to the default.
    pub fn clamped_quality(&self) -> f32 {
        if self.quality.is_nan() {
            return defaults::DEFAULT_QUALITY;
        }
        self.quality.clamp(0.0, 1.0)
    }

    /// JPEG encoder quality on its 1..=100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        ((self.clamped_quality() * 100.0).round() as u8).clamp(1, 100)
    }
}
