//! Store statistics and tag usage.

use console::style;

use fl_core::config::ConfigHandle;
use fl_core::error::FlResult;
use fl_imaging::format_file_size;
use fl_services::ServiceRegistry;

use crate::OutputFormat;

pub async fn stats(config: ConfigHandle, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_stats(&registry, format).await;
    super::finish(registry, result)
}

async fn run_stats(registry: &ServiceRegistry, format: OutputFormat) -> FlResult<()> {
    let stats = registry.records().stats()?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::to_value(&stats)?),
        OutputFormat::Text => {
            println!("{}", style("FoodLog Statistics").bold().underlined());
            println!("  Records:       {}", stats.records);
            println!("  Favorites:     {}", stats.favorites);
            println!("  Distinct tags: {}", stats.distinct_tags);
            println!("  Photo data:    {}", format_file_size(stats.photo_bytes.max(0) as u64));
        }
    }
    Ok(())
}

pub async fn tags(config: ConfigHandle, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_tags(&registry, format).await;
    super::finish(registry, result)
}

async fn run_tags(registry: &ServiceRegistry, format: OutputFormat) -> FlResult<()> {
    let counts = registry.records().tag_counts()?;

    match format {
        OutputFormat::Json => {
            let json: Vec<_> = counts
                .iter()
                .map(|(tag, count)| serde_json::json!({ "tag": tag, "count": count }))
                .collect();
            super::print_json(&serde_json::Value::Array(json));
        }
        OutputFormat::Text => {
            if counts.is_empty() {
                println!("No tags yet.");
                return Ok(());
            }
            let mut table = super::new_table();
            table.set_header(vec!["Tag", "Records"]);
            for (tag, count) in &counts {
                table.add_row(vec![tag.clone(), count.to_string()]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
