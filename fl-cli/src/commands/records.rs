//! Record commands: add, list, show, search, edit, favorite, delete.

use std::path::PathBuf;

use chrono::Local;
use clap::Args;
use console::style;
use dialoguer::Confirm;

use fl_core::config::ConfigHandle;
use fl_core::error::{FlError, FlResult};
use fl_core::time;
use fl_imaging::format_file_size;
use fl_models::queries::parse_tags;
use fl_models::{FoodRecord, FoodRecordUpdate, Location, NewFoodRecord, Photo, SearchFilters};
use fl_services::ServiceRegistry;

use crate::OutputFormat;

#[derive(Args)]
pub struct AddArgs {
    /// Photo file of the meal.
    pub photo: PathBuf,
    /// Free-form comment.
    #[arg(short, long, default_value = "")]
    pub comment: String,
    /// Tags, separated by commas or spaces.
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Latitude of where the meal was eaten.
    #[arg(long, requires_all = ["lng", "accuracy"], allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// Longitude of where the meal was eaten.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,
    /// Location accuracy in meters.
    #[arg(long, requires = "lat")]
    pub accuracy: Option<f64>,
    /// Mark the record as a favorite.
    #[arg(long)]
    pub favorite: bool,
    /// When the meal happened (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long)]
    pub at: Option<String>,
    /// Store the photo as is instead of compressing it.
    #[arg(long)]
    pub no_compress: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Earliest meal date, inclusive (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,
    /// Latest meal date, inclusive (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,
    /// Tags that must all be present, separated by commas or spaces.
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Text to find in comments (case-insensitive).
    #[arg(long)]
    pub text: Option<String>,
    /// Only favorites.
    #[arg(long)]
    pub favorites: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Record id.
    pub id: i64,
    /// New comment.
    #[arg(short, long)]
    pub comment: Option<String>,
    /// Replace all tags, separated by commas or spaces.
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Set the favorite flag.
    #[arg(long)]
    pub favorite: Option<bool>,
    /// New meal time (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub at: Option<String>,
    /// New latitude.
    #[arg(
        long,
        requires_all = ["lng", "accuracy"],
        allow_hyphen_values = true,
        conflicts_with = "clear_location"
    )]
    pub lat: Option<f64>,
    /// New longitude.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,
    /// New location accuracy in meters.
    #[arg(long, requires = "lat")]
    pub accuracy: Option<f64>,
    /// Remove the stored location.
    #[arg(long)]
    pub clear_location: bool,
    /// Replace the photo with this file (compressed with the configured defaults).
    #[arg(long)]
    pub photo: Option<PathBuf>,
}

fn location(lat: Option<f64>, lng: Option<f64>, accuracy: Option<f64>) -> Option<Location> {
    match (lat, lng, accuracy) {
        (Some(lat), Some(lng), Some(accuracy)) => Some(Location { lat, lng, accuracy }),
        _ => None,
    }
}

fn when(record: &FoodRecord) -> String {
    record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Read `path` and compress it, drawing a progress bar.
async fn load_photo(
    registry: &ServiceRegistry,
    path: &PathBuf,
    compress: bool,
    format: OutputFormat,
) -> FlResult<Photo> {
    let source = std::fs::read(path)?;

    if !compress {
        let info = registry.compression().image_info(&source)?;
        return Ok(Photo::new(source, info.mime_type));
    }

    let pb = super::percent_bar("Compressing", format);
    let pb_clone = pb.clone();
    let result = registry
        .compression()
        .compress(&source, None, move |p| pb_clone.set_position(u64::from(p)))
        .await;
    pb.finish_and_clear();
    let result = result?;

    if format == OutputFormat::Text {
        println!(
            "  {} {} -> {} ({:.0}% smaller), {}x{}",
            style("PHOTO").cyan().bold(),
            format_file_size(result.original_size as u64),
            format_file_size(result.compressed_size as u64),
            result.compression_ratio * 100.0,
            result.width,
            result.height,
        );
    }
    Ok(result.photo)
}

fn print_records(records: &[FoodRecord], format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Json => {
            let json: Vec<_> = records.iter().map(super::record_json).collect();
            super::print_json(&serde_json::Value::Array(json));
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("{empty}");
                return;
            }
            let mut table = super::new_table();
            table.set_header(vec!["ID", "When", "Comment", "Tags", "Fav"]);
            for r in records {
                table.add_row(vec![
                    r.id.to_string(),
                    when(r),
                    super::truncate(&r.comment, 40),
                    super::truncate(&r.tags.join(", "), 30),
                    if r.favorite { "*".to_string() } else { String::new() },
                ]);
            }
            println!("{table}");
            println!("  {} record(s)", records.len());
        }
    }
}

fn print_record(record: &FoodRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => super::print_json(&super::record_json(record)),
        OutputFormat::Text => {
            println!("{}", style(format!("Record #{}", record.id)).bold().underlined());
            println!("  When:       {}", when(record));
            println!("  Comment:    {}", if record.comment.is_empty() { "-" } else { &record.comment });
            println!("  Tags:       {}", if record.tags.is_empty() { "-".to_string() } else { record.tags.join(", ") });
            match record.location {
                Some(Location { lat, lng, accuracy }) => {
                    println!("  Location:   {lat:.5}, {lng:.5} (+/- {accuracy:.0} m)");
                }
                None => println!("  Location:   -"),
            }
            println!("  Favorite:   {}", if record.favorite { "yes" } else { "no" });
            println!(
                "  Photo:      {} ({})",
                record.photo.mime_type,
                format_file_size(record.photo.len() as u64)
            );
            println!("  Created:    {}", time::to_iso(&record.created_at));
            println!("  Updated:    {}", time::to_iso(&record.updated_at));
        }
    }
}

pub async fn add(config: ConfigHandle, args: AddArgs, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_add(&registry, args, format).await;
    super::finish(registry, result)
}

async fn run_add(registry: &ServiceRegistry, args: AddArgs, format: OutputFormat) -> FlResult<()> {
    let timestamp = match args.at.as_deref() {
        Some(at) => super::parse_instant(at, false)?,
        None => time::now(),
    };
    let photo = load_photo(registry, &args.photo, !args.no_compress, format).await?;

    let mut record = NewFoodRecord::new(photo, timestamp);
    record.comment = args.comment;
    record.tags = args.tags.as_deref().map(parse_tags).unwrap_or_default();
    record.location = location(args.lat, args.lng, args.accuracy);
    record.favorite = args.favorite;

    let id = registry.records().create(&record)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "id": id })),
        OutputFormat::Text => println!("  {} Saved record #{id}", style("OK").green().bold()),
    }
    Ok(())
}

pub async fn list(config: ConfigHandle, limit: Option<usize>, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_list(&registry, limit, format).await;
    super::finish(registry, result)
}

async fn run_list(registry: &ServiceRegistry, limit: Option<usize>, format: OutputFormat) -> FlResult<()> {
    let mut records = registry.records().get_all()?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    print_records(&records, format, "No records yet. Add one with `foodlog add <photo>`.");
    Ok(())
}

pub async fn show(config: ConfigHandle, id: i64, save_photo: Option<PathBuf>, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_show(&registry, id, save_photo, format).await;
    super::finish(registry, result)
}

async fn run_show(registry: &ServiceRegistry, id: i64, save_photo: Option<PathBuf>, format: OutputFormat) -> FlResult<()> {
    let record = registry
        .records()
        .get_by_id(id)?
        .ok_or_else(|| FlError::NotFound(format!("food record {id}")))?;

    print_record(&record, format);

    if let Some(path) = save_photo {
        std::fs::write(&path, &record.photo.bytes)?;
        if format == OutputFormat::Text {
            println!("  {} Photo written to {}", style("OK").green().bold(), path.display());
        }
    }
    Ok(())
}

pub async fn search(config: ConfigHandle, args: SearchArgs, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_search(&registry, args, format).await;
    super::finish(registry, result)
}

async fn run_search(registry: &ServiceRegistry, args: SearchArgs, format: OutputFormat) -> FlResult<()> {
    let filters = SearchFilters {
        date_from: args.from.as_deref().map(|s| super::parse_instant(s, false)).transpose()?,
        date_to: args.to.as_deref().map(|s| super::parse_instant(s, true)).transpose()?,
        tags: args.tags.as_deref().map(parse_tags).unwrap_or_default(),
        search_text: args.text,
        favorites_only: args.favorites,
    };

    let records = registry.records().search(&filters)?;
    print_records(&records, format, "No matching records.");
    Ok(())
}

pub async fn edit(config: ConfigHandle, args: EditArgs, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_edit(&registry, args, format).await;
    super::finish(registry, result)
}

async fn run_edit(registry: &ServiceRegistry, args: EditArgs, format: OutputFormat) -> FlResult<()> {
    let mut update = FoodRecordUpdate {
        comment: args.comment,
        tags: args.tags.as_deref().map(parse_tags),
        favorite: args.favorite,
        timestamp: args.at.as_deref().map(|s| super::parse_instant(s, false)).transpose()?,
        ..Default::default()
    };
    if args.clear_location {
        update.location = Some(None);
    } else if let Some(loc) = location(args.lat, args.lng, args.accuracy) {
        update.location = Some(Some(loc));
    }
    if let Some(path) = args.photo.as_ref() {
        update.photo = Some(load_photo(registry, path, true, format).await?);
    }

    if update.is_empty() {
        println!("  Nothing to change.");
        return Ok(());
    }

    let record = registry.records().update(args.id, &update)?;
    match format {
        OutputFormat::Json => super::print_json(&super::record_json(&record)),
        OutputFormat::Text => println!("  {} Updated record #{}", style("OK").green().bold(), record.id),
    }
    Ok(())
}

pub async fn favorite(config: ConfigHandle, id: i64, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_favorite(&registry, id, format).await;
    super::finish(registry, result)
}

async fn run_favorite(registry: &ServiceRegistry, id: i64, format: OutputFormat) -> FlResult<()> {
    let favorite = registry.records().toggle_favorite(id)?;
    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "id": id, "favorite": favorite })),
        OutputFormat::Text => {
            let label = if favorite { "marked as favorite" } else { "no longer a favorite" };
            println!("  {} Record #{id} {label}", style("OK").green().bold());
        }
    }
    Ok(())
}

pub async fn delete(config: ConfigHandle, id: i64, yes: bool, format: OutputFormat) -> FlResult<()> {
    let registry = super::init_services(&config).await?;
    let result = run_delete(&registry, id, yes, format).await;
    super::finish(registry, result)
}

async fn run_delete(registry: &ServiceRegistry, id: i64, yes: bool, format: OutputFormat) -> FlResult<()> {
    if !yes {
        if let Some(record) = registry.records().get_by_id(id)? {
            println!("  Record #{id}: {} ({})", super::truncate(&record.comment, 40), when(&record));
        }
        let confirmed = Confirm::new()
            .with_prompt("  Delete this record permanently?")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("  Delete cancelled.");
            return Ok(());
        }
    }

    let deleted = registry.records().delete(id)?;
    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "id": id, "deleted": deleted })),
        OutputFormat::Text if deleted => println!("  {} Deleted record #{id}", style("OK").green().bold()),
        OutputFormat::Text => println!("  {} No record #{id}", style("WARN").yellow().bold()),
    }
    Ok(())
}
