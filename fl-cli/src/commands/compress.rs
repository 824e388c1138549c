//! Standalone image compression, without touching the record store.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;

use fl_core::config::ConfigHandle;
use fl_core::error::FlResult;
use fl_imaging::{format_file_size, CompressionOptions, OutputFormat as ImageFormat};
use fl_services::{CompressionService, EventBus, Service};

use crate::OutputFormat;

#[derive(Args)]
pub struct CompressArgs {
    /// Image file to compress.
    pub input: PathBuf,
    /// Where to write the result. Defaults to `<input>-compressed.<ext>`.
    pub output: Option<PathBuf>,
    /// Maximum output width in pixels.
    #[arg(long)]
    pub max_width: Option<u32>,
    /// Maximum output height in pixels.
    #[arg(long)]
    pub max_height: Option<u32>,
    /// Encoder quality between 0.0 and 1.0.
    #[arg(short, long)]
    pub quality: Option<f32>,
    /// Output format (jpeg, png, webp).
    #[arg(long)]
    pub format: Option<String>,
    /// Fit each axis independently instead of keeping the aspect ratio.
    #[arg(long)]
    pub no_aspect: bool,
}

impl CompressArgs {
    fn options(&self, defaults: CompressionOptions) -> FlResult<CompressionOptions> {
        let mut options = defaults;
        if let Some(w) = self.max_width {
            options.max_width = w;
        }
        if let Some(h) = self.max_height {
            options.max_height = h;
        }
        if let Some(q) = self.quality {
            options.quality = q;
        }
        if let Some(f) = self.format.as_deref() {
            options.format = f.parse::<ImageFormat>()?;
        }
        if self.no_aspect {
            options.maintain_aspect_ratio = false;
        }
        Ok(options)
    }
}

fn default_output(input: &Path, format: ImageFormat) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("photo");
    input.with_file_name(format!("{stem}-compressed.{}", format.extension()))
}

pub async fn run(config: ConfigHandle, args: CompressArgs, format: OutputFormat) -> FlResult<()> {
    let compression = config.read().await.compression.clone();
    let defaults = CompressionOptions::from_config(&compression)?;
    let options = args.options(defaults)?;
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input, options.format));

    let source = std::fs::read(&args.input)?;

    let mut service = CompressionService::new(defaults, compression.use_background_worker, EventBus::new(16));
    service.init()?;

    let pb = super::percent_bar("Compressing", format);
    let pb_clone = pb.clone();
    let result = service
        .compress(&source, Some(options), move |p| pb_clone.set_position(u64::from(p)))
        .await;
    pb.finish_and_clear();
    let strategy = service.strategy();
    let shutdown = service.shutdown();
    let result = result?;
    shutdown?;

    std::fs::write(&output, &result.photo.bytes)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "output": output.display().to_string(),
            "mimeType": result.photo.mime_type,
            "width": result.width,
            "height": result.height,
            "originalSize": result.original_size,
            "compressedSize": result.compressed_size,
            "compressionRatio": result.compression_ratio,
            "strategy": strategy.to_string(),
        })),
        OutputFormat::Text => {
            println!("  {} Wrote {}", style("OK").green().bold(), output.display());
            println!("  Size:       {} -> {}", format_file_size(result.original_size as u64), format_file_size(result.compressed_size as u64));
            println!("  Saved:      {:.1}%", result.compression_ratio * 100.0);
            println!("  Dimensions: {}x{} ({})", result.width, result.height, result.photo.mime_type);
        }
    }
    Ok(())
}
