//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions for a source image under a bounding box.
///
/// With `maintain_aspect_ratio`, the image shrinks uniformly until it fits
/// inside `max_width` x `max_height`; the result is rounded to whole pixels.
/// Without it, each dimension is clamped independently. Images are never
/// upscaled and no dimension drops below 1.
///
/// # Examples
/// ```
/// # use fl_imaging::calculate_target_dimensions;
/// // 2000x1000 into 1200x1200 keeps 2:1
/// assert_eq!(calculate_target_dimensions((2000, 1000), (1200, 1200), true), (1200, 600));
///
/// // Small images are left alone
/// assert_eq!(calculate_target_dimensions((640, 480), (1200, 1200), true), (640, 480));
/// ```
pub fn calculate_target_dimensions(
    source: (u32, u32),
    max: (u32, u32),
    maintain_aspect_ratio: bool,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = max;

    if !maintain_aspect_ratio {
        return (src_w.min(max_w).max(1), src_h.min(max_h).max(1));
    }

    if src_w == 0 || src_h == 0 {
        return (src_w.max(1), src_h.max(1));
    }

    let aspect = src_w as f64 / src_h as f64;
    let mut width = src_w as f64;
    let mut height = src_h as f64;

    // Width over the limit: pin width, derive height
    if width > max_w as f64 {
        width = max_w as f64;
        height = width / aspect;
    }

    // Height still over the limit: pin height, derive width
    if height > max_h as f64 {
        height = max_h as f64;
        width = height * aspect;
    }

    let w = (width.round() as u32).max(1);
    let h = (height.round() as u32).max(1);
    (w, h)
}

/// Share of bytes saved, `(original - compressed) / original`.
///
/// Zero for an empty original. Negative when the output grew.
pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) / original as f64
}
