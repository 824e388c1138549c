//! High-level image operations that combine calculations with backend execution.
//!
//! [`compress_photo`] is the compression pipeline: decode, fit into the
//! bounding box, render (white under JPEG), encode. It reports progress at
//! fixed milestones so callers can drive a progress bar.

use image::Rgb;
use serde::Serialize;
use tracing::debug;

use fl_core::error::FlResult;
use fl_models::Photo;

use super::backend::ImageBackend;
use super::calculations::{calculate_target_dimensions, compression_ratio};
use super::params::CompressionOptions;

/// Progress milestones reported by [`compress_photo`].
pub mod milestones {
    pub const STARTED: u8 = 0;
    pub const DECODED: u8 = 30;
    pub const RENDERED: u8 = 60;
    pub const DONE: u8 = 100;
}

/// Output of one compression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub photo: Photo,
    pub width: u32,
    pub height: u32,
    pub original_size: usize,
    pub compressed_size: usize,
    /// `(original - compressed) / original`; 0 for an empty original.
    pub compression_ratio: f64,
}

/// Basic facts about an image, read without compressing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub size: usize,
    pub mime_type: String,
}

/// Compress `source` according to `options`.
///
/// `progress` receives 0 on start, a value after decoding, another after
/// rendering, and 100 on completion. Fails with `ImageDecode` if the source
/// cannot be read and `Encode` if the encoder refuses.
pub fn compress_photo(
    backend: &dyn ImageBackend,
    source: &[u8],
    options: &CompressionOptions,
    progress: &dyn Fn(u8),
) -> FlResult<CompressionResult> {
    progress(milestones::STARTED);

    let decoded = backend.decode(source)?;
    progress(milestones::DECODED);

    let (width, height) = calculate_target_dimensions(
        (decoded.width(), decoded.height()),
        (options.max_width, options.max_height),
        options.maintain_aspect_ratio,
    );
    let background = options.format.is_opaque().then_some(Rgb([255, 255, 255]));
    let rendered = backend.render(&decoded, width, height, background);
    drop(decoded);
    progress(milestones::RENDERED);

    let bytes = backend.encode(&rendered, options.format, options.clamped_quality())?;
    let compressed_size = bytes.len();
    progress(milestones::DONE);

    debug!(
        from = source.len(),
        to = compressed_size,
        width,
        height,
        format = %options.format,
        "photo compressed"
    );

    Ok(CompressionResult {
        photo: Photo::new(bytes, options.format.mime_type()),
        width,
        height,
        original_size: source.len(),
        compressed_size,
        compression_ratio: compression_ratio(source.len(), compressed_size),
    })
}

/// Read dimensions, size and MIME type of an image.
pub fn image_info(backend: &dyn ImageBackend, source: &[u8]) -> FlResult<ImageInfo> {
    let dims = backend.identify(source)?;
    let mime_type = image::guess_format(source)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string());
    Ok(ImageInfo {
        width: dims.width,
        height: dims.height,
        size: source.len(),
        mime_type,
    })
}

/// Human-readable size with binary units, e.g. `"1.5 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let size = bytes as f64 / 1024f64.powi(exp as i32);
    if exp == 0 {
        format!("{size:.0} {}", UNITS[exp])
    } else {
        format!("{size:.1} {}", UNITS[exp])
    }
}
