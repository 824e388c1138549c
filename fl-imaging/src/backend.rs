//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the steps of compression every backend
//! must support: identify, decode, render and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built entirely on the
//! `image` crate.

use image::{DynamicImage, Rgb};

use fl_core::error::FlResult;

use super::params::OutputFormat;

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Decode errors are reported as `ImageDecode`, encoder failures as `Encode`.
pub trait ImageBackend: Send + Sync {
    /// Read the pixel size without decoding the whole image.
    fn identify(&self, source: &[u8]) -> FlResult<Dimensions>;

    /// Decode the source bytes to pixels.
    fn decode(&self, source: &[u8]) -> FlResult<DynamicImage>;

    /// Draw `image` onto a `width` x `height` surface, optionally pre-filled
    /// with an opaque `background`.
    fn render(&self, image: &DynamicImage, width: u32, height: u32, background: Option<Rgb<u8>>) -> DynamicImage;

    /// Encode pixels to `format`. `quality` is in [0, 1].
    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: f32) -> FlResult<Vec<u8>>;
}
