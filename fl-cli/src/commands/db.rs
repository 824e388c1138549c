//! Database management commands.

use std::path::Path;

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use fl_core::config::ConfigHandle;
use fl_core::error::FlResult;
use fl_imaging::format_file_size;
use fl_models::Database;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum DbAction {
    /// Show row counts, file sizes and SQLite internals.
    Info,
    /// Run an integrity check.
    Check,
    /// Reset the database (WARNING: destroys all records).
    Reset {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the database file path.
    Path,
}

fn pragma_i64(db: &Database, pragma: &str) -> FlResult<i64> {
    let conn = db.conn()?;
    Ok(conn.query_row(&format!("PRAGMA {pragma}"), [], |row| row.get(0)).unwrap_or(0))
}

fn foreign_key_violations(db: &Database) -> FlResult<Vec<String>> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let rows = stmt
        .query_map([], |row| {
            let table: String = row.get(0)?;
            let rowid: i64 = row.get(1)?;
            let parent: String = row.get(2)?;
            Ok(format!("{table} row {rowid} -> {parent}"))
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

fn info(db: &Database, db_path: &Path, format: OutputFormat) -> FlResult<()> {
    let stats = db.stats()?;

    let file_size = std::fs::metadata(db_path).ok().map(|m| m.len());
    let wal_size = std::fs::metadata(db_path.with_extension("db-wal")).ok().map(|m| m.len());

    let journal_mode: String = db
        .conn()?
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap_or_else(|_| "unknown".to_string());
    let page_size = pragma_i64(db, "page_size")?;
    let page_count = pragma_i64(db, "page_count")?;
    let freelist_count = pragma_i64(db, "freelist_count")?;
    let schema_version = fl_models::migrations::get_schema_version(&*db.conn()?)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "path": db_path.display().to_string(),
            "stats": stats,
            "file_size_bytes": file_size,
            "wal_size_bytes": wal_size,
            "journal_mode": journal_mode,
            "schema_version": schema_version,
            "page_size": page_size,
            "page_count": page_count,
            "freelist_count": freelist_count,
        })),
        OutputFormat::Text => {
            println!("{}", style("Database").bold().underlined());
            println!("  Path:          {}", db_path.display());
            println!("  Journal mode:  {journal_mode}");
            println!("  Schema:        v{schema_version}");
            println!();

            let mut table = super::new_table();
            table.set_header(vec!["Metric", "Value"]);
            table.add_row(vec!["records".to_string(), stats.records.to_string()]);
            table.add_row(vec!["favorites".to_string(), stats.favorites.to_string()]);
            table.add_row(vec!["distinct tags".to_string(), stats.distinct_tags.to_string()]);
            table.add_row(vec![
                "photo data".to_string(),
                format_file_size(stats.photo_bytes.max(0) as u64),
            ]);
            println!("{table}");

            println!();
            println!("{}", style("Storage").bold().underlined());
            if let Some(size) = file_size {
                println!("  Database:      {}", format_file_size(size));
            }
            if let Some(size) = wal_size {
                println!("  WAL file:      {}", format_file_size(size));
            }
            println!("  Page size:     {page_size} bytes");
            println!("  Page count:    {page_count}");
            println!("  Free pages:    {freelist_count}");
            if freelist_count > 0 {
                println!(
                    "  Reclaimable:   {} (run VACUUM to reclaim)",
                    format_file_size((freelist_count * page_size).max(0) as u64)
                );
            }
        }
    }
    Ok(())
}

fn check(db: &Database, format: OutputFormat) -> FlResult<()> {
    let integrity = db.run_integrity_check();
    let violations = foreign_key_violations(db)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "integrity_ok": integrity.is_ok(),
            "integrity_error": integrity.as_ref().err().map(|e| e.detail()),
            "foreign_key_violations": violations,
        })),
        OutputFormat::Text => {
            match &integrity {
                Ok(()) => println!("  {} Integrity check passed.", style("OK").green().bold()),
                Err(e) => println!("  {} Integrity check failed: {e}", style("FAIL").red().bold()),
            }
            if violations.is_empty() {
                println!("  {} Tag references OK.", style("OK").green().bold());
            } else {
                println!(
                    "  {} {} foreign key violation(s):",
                    style("WARN").yellow().bold(),
                    violations.len()
                );
                for v in violations.iter().take(10) {
                    println!("    - {v}");
                }
                if violations.len() > 10 {
                    println!("    ... and {} more", violations.len() - 10);
                }
            }
        }
    }
    Ok(())
}

pub async fn run(config: ConfigHandle, action: DbAction, format: OutputFormat) -> FlResult<()> {
    let db_path = config.read().await.effective_db_path()?;

    match action {
        DbAction::Info => {
            let db = super::init_database(&config).await?;
            let result = info(&db, &db_path, format);
            super::close_database(db, result)?;
        }
        DbAction::Check => {
            if format == OutputFormat::Text {
                println!("  {} Running integrity check...", style("...").dim());
            }
            let db = super::init_database(&config).await?;
            let result = check(&db, format);
            super::close_database(db, result)?;
        }
        DbAction::Reset { yes } => {
            if !yes {
                println!("  {} This will delete ALL food records.", style("WARNING").red().bold());
                println!("  Database: {}", db_path.display());

                let confirmed = Confirm::new()
                    .with_prompt("  Are you sure you want to reset the database?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !confirmed {
                    println!("  Reset cancelled.");
                    return Ok(());
                }
            }

            let db = super::init_database(&config).await?;
            let result = db.reset();
            super::close_database(db, result)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "reset": true })),
                OutputFormat::Text => println!("  {} Database reset complete.", style("OK").green().bold()),
            }
        }
        DbAction::Path => match format {
            OutputFormat::Json => {
                super::print_json(&serde_json::json!({ "path": db_path.display().to_string() }))
            }
            OutputFormat::Text => println!("{}", db_path.display()),
        },
    }

    Ok(())
}
