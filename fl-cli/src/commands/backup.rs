//! Backup commands: export, import, validate.

use std::path::PathBuf;

use console::style;

use fl_core::config::ConfigHandle;
use fl_core::error::FlResult;
use fl_core::time;
use fl_services::ServiceRegistry;

use crate::OutputFormat;

pub async fn export(config: ConfigHandle, path: Option<PathBuf>, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_export(&registry, path, format).await;
    super::finish(registry, result)
}

async fn run_export(registry: &ServiceRegistry, path: Option<PathBuf>, format: OutputFormat) -> FlResult<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(registry.data_ops().export_file_name(time::now())));

    let pb = super::percent_bar("Exporting", format);
    let pb_clone = pb.clone();
    let text = registry
        .data_ops()
        .export_all(registry.records(), move |p| pb_clone.set_position(u64::from(p)))
        .await;
    pb.finish_and_clear();
    let text = text?;

    std::fs::write(&path, &text)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "bytes": text.len(),
        })),
        OutputFormat::Text => println!(
            "  {} Backup written to {} ({})",
            style("OK").green().bold(),
            path.display(),
            fl_imaging::format_file_size(text.len() as u64),
        ),
    }
    Ok(())
}

pub async fn import(config: ConfigHandle, path: PathBuf, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_import(&registry, path, format).await;
    super::finish(registry, result)
}

async fn run_import(registry: &ServiceRegistry, path: PathBuf, format: OutputFormat) -> FlResult<()> {
    let text = std::fs::read_to_string(&path)?;

    let pb = super::percent_bar("Importing", format);
    let pb_clone = pb.clone();
    let summary = registry
        .data_ops()
        .import_text(&text, registry.records(), move |p| pb_clone.set_position(u64::from(p)))
        .await;
    pb.finish_and_clear();
    let summary = summary?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::to_value(summary)?),
        OutputFormat::Text => {
            println!("  {} Imported {} record(s)", style("OK").green().bold(), summary.imported);
            if summary.skipped > 0 {
                println!(
                    "  {} Skipped {} record(s) that could not be decoded",
                    style("WARN").yellow().bold(),
                    summary.skipped
                );
            }
        }
    }
    Ok(())
}

pub async fn validate(config: ConfigHandle, path: PathBuf, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_validate(&registry, path, format).await;
    super::finish(registry, result)
}

async fn run_validate(registry: &ServiceRegistry, path: PathBuf, format: OutputFormat) -> FlResult<()> {
    let text = std::fs::read_to_string(&path)?;
    let result = registry.data_ops().validate_text(&text).await?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "isValid": result.is_valid,
            "errors": result.errors,
        })),
        OutputFormat::Text if result.is_valid => {
            println!("  {} {} is a valid backup", style("OK").green().bold(), path.display());
        }
        OutputFormat::Text => {
            println!("  {} {} is not a valid backup", style("FAIL").red().bold(), path.display());
            for error in &result.errors {
                println!("    - {error}");
            }
        }
    }
    Ok(())
}
