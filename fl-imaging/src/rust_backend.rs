//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP, GIF, BMP) | `ImageReader::decode` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Background fill | `RgbaImage::from_pixel` + `imageops::overlay` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality` |
//! | Encode → WebP | `WebPEncoder::new_lossless` |

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, Rgb, Rgba, RgbaImage};
use tracing::trace;

use fl_core::error::{FlError, FlResult};

use super::backend::{Dimensions, ImageBackend};
use super::params::{CompressionOptions, OutputFormat};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(source: &[u8]) -> FlResult<ImageReader<Cursor<&[u8]>>> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| FlError::ImageDecode(format!("cannot read image: {e}")))
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> FlResult<Dimensions> {
        let (width, height) = reader(source)?
            .into_dimensions()
            .map_err(|e| FlError::ImageDecode(format!("cannot read image header: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, source: &[u8]) -> FlResult<DynamicImage> {
        let reader = reader(source)?;
        if reader.format().is_none() {
            return Err(FlError::ImageDecode("unrecognized image format".into()));
        }
        reader
            .decode()
            .map_err(|e| FlError::ImageDecode(format!("failed to decode image: {e}")))
    }

    fn render(&self, image: &DynamicImage, width: u32, height: u32, background: Option<Rgb<u8>>) -> DynamicImage {
        let resized = if image.width() == width && image.height() == height {
            image.clone()
        } else {
            image.resize_exact(width, height, FilterType::Lanczos3)
        };

        match background {
            Some(Rgb([r, g, b])) => {
                let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
                imageops::overlay(&mut canvas, &resized.to_rgba8(), 0, 0);
                DynamicImage::ImageRgba8(canvas)
            }
            None => resized,
        }
    }

    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: f32) -> FlResult<Vec<u8>> {
        let mut out = Vec::new();
        let encode_err = |e: image::ImageError| FlError::Encode(format!("{format} encoding failed: {e}"));

        match format {
            OutputFormat::Jpeg => {
                let q = CompressionOptions { quality, ..Default::default() }.jpeg_quality();
                trace!(q, "encoding jpeg");
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, q))
                    .map_err(encode_err)?;
            }
            OutputFormat::Png => {
                // Lossless either way; lower quality asks for a smaller file.
                let compression = if quality < 0.5 {
                    CompressionType::Best
                } else {
                    CompressionType::Default
                };
                let encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilter::Adaptive);
                image.write_with_encoder(encoder).map_err(encode_err)?;
            }
            OutputFormat::WebP => {
                let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
                rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))
                    .map_err(encode_err)?;
            }
        }

        if out.is_empty() {
            return Err(FlError::Encode(format!("{format} encoder produced no output")));
        }
        Ok(out)
    }
}
