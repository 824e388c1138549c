//! FoodLog CLI - Command-line front end for the FoodLog food diary.
//!
//! Records meals from photo files, browses and searches the local store,
//! and moves the whole diary in and out of portable JSON backups.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing::{error, info};

use fl_core::config::{AppConfig, ConfigHandle};
use fl_core::error::FlResult;
use fl_core::logging;

/// FoodLog - a local-only photo food diary.
#[derive(Parser)]
#[command(
    name = "foodlog",
    version,
    about = "FoodLog food diary CLI",
    long_about = "A command-line interface for the FoodLog food diary.\n\
                   Log meals with a photo, comment, tags and location, then search,\n\
                   edit, export and import them. Everything stays on this device."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a meal from a photo file.
    Add(commands::records::AddArgs),
    /// List all records, newest first.
    List {
        /// Maximum number of records to show.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show one record in detail.
    Show {
        /// Record id.
        id: i64,
        /// Write the record's photo to this file.
        #[arg(long)]
        save_photo: Option<PathBuf>,
    },
    /// Search records by date range, tags, comment text and favorites.
    Search(commands::records::SearchArgs),
    /// Edit fields of an existing record.
    Edit(commands::records::EditArgs),
    /// Toggle the favorite flag of a record.
    Favorite {
        /// Record id.
        id: i64,
    },
    /// Permanently delete a record.
    Delete {
        /// Record id.
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Export every record to a JSON backup file.
    Export {
        /// Output path. Defaults to foodlog-backup-<date>.json in the current directory.
        path: Option<PathBuf>,
    },
    /// Import records from a JSON backup file.
    Import {
        /// Backup file to read.
        path: PathBuf,
    },
    /// Check a JSON backup file without importing it.
    Validate {
        /// Backup file to check.
        path: PathBuf,
    },
    /// Compress an image file without storing it.
    Compress(commands::compress::CompressArgs),
    /// Show store statistics.
    Stats,
    /// List tags by how often they are used.
    Tags,
    /// Database management commands.
    Db {
        #[command(subcommand)]
        action: commands::db::DbAction,
    },
}

fn load_config(path: Option<&PathBuf>) -> FlResult<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load_default(),
    }
}

async fn run(cli: Cli) -> FlResult<()> {
    let config = load_config(cli.config.as_ref())?;

    // Initialize logging
    let log_dir = config.effective_log_dir()?;
    let _guard = if cli.verbose {
        logging::init_logging("debug", &log_dir, config.logging.json_output)?
    } else {
        logging::init_from_config(&config.logging, &log_dir)?
    };

    info!("FoodLog CLI v{}", fl_core::constants::APP_VERSION);

    let config_handle = ConfigHandle::new(config);
    let format = cli.format;

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Add(args) => commands::records::add(config_handle, args, format).await,
        Commands::List { limit } => commands::records::list(config_handle, limit, format).await,
        Commands::Show { id, save_photo } => {
            commands::records::show(config_handle, id, save_photo, format).await
        }
        Commands::Search(args) => commands::records::search(config_handle, args, format).await,
        Commands::Edit(args) => commands::records::edit(config_handle, args, format).await,
        Commands::Favorite { id } => commands::records::favorite(config_handle, id, format).await,
        Commands::Delete { id, yes } => commands::records::delete(config_handle, id, yes, format).await,
        Commands::Export { path } => commands::backup::export(config_handle, path, format).await,
        Commands::Import { path } => commands::backup::import(config_handle, path, format).await,
        Commands::Validate { path } => commands::backup::validate(config_handle, path, format).await,
        Commands::Compress(args) => commands::compress::run(config_handle, args, format).await,
        Commands::Stats => commands::stats::stats(config_handle, format).await,
        Commands::Tags => commands::stats::tags(config_handle, format).await,
        Commands::Db { action } => commands::db::run(config_handle, action, format).await,
    };

    if let Err(ref e) = result {
        error!("command failed: {e}");
    }
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "error": e.user_message(),
                        "kind": e.kind(),
                    })
                );
            }
            OutputFormat::Text => {
                eprintln!("  {} {}", style("ERROR").red().bold(), e.user_message());
            }
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_needs_all_three_coordinates() {
        let full = Cli::try_parse_from([
            "foodlog", "add", "meal.jpg", "--lat", "35.6", "--lng", "139.7", "--accuracy", "12",
        ]);
        assert!(full.is_ok());

        let missing = Cli::try_parse_from(["foodlog", "add", "meal.jpg", "--lat", "35.6", "--lng", "139.7"]);
        assert!(missing.is_err());

        let alone = Cli::try_parse_from(["foodlog", "add", "meal.jpg", "--accuracy", "12"]);
        assert!(alone.is_err());
    }
}
