//! FoodLog Imaging - photo compression, pure Rust.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with guessed format |
//! | **Resize** | `DynamicImage::resize_exact` with `Lanczos3` |
//! | **JPEG background** | white canvas + `imageops::overlay` |
//! | **Encode** | `JpegEncoder`, `PngEncoder`, lossless `WebPEncoder` |
//!
//! The crate is split into:
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: compression options and output formats
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: the compression pipeline combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{Dimensions, ImageBackend};
pub use calculations::calculate_target_dimensions;
pub use operations::{compress_photo, format_file_size, image_info, CompressionResult, ImageInfo};
pub use params::{CompressionOptions, OutputFormat};
pub use rust_backend::RustBackend;
