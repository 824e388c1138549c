//! CLI command implementations.

pub mod records;
pub mod backup;
pub mod compress;
pub mod stats;
pub mod db;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use fl_core::config::ConfigHandle;
use fl_core::error::{FlError, FlResult};
use fl_core::time;
use fl_models::{Database, FoodRecord};
use fl_services::ServiceRegistry;

use crate::OutputFormat;

/// Helper to open the database from config.
pub async fn init_database(config: &ConfigHandle) -> FlResult<Database> {
    let (db_path, db_config) = {
        let cfg = config.read().await;
        (cfg.effective_db_path()?, cfg.database.clone())
    };
    Database::open(&db_path, &db_config)
}

/// Helper to open the database and start every service.
pub async fn init_services(config: &ConfigHandle) -> FlResult<ServiceRegistry> {
    let db = init_database(config).await?;
    let mut registry = ServiceRegistry::new(config.clone(), db).await?;
    registry.init_all()?;
    Ok(registry)
}

/// Shut the services down and close the store, then hand back `result`.
///
/// The command's own error wins over a shutdown error.
pub fn finish<T>(mut registry: ServiceRegistry, result: FlResult<T>) -> FlResult<T> {
    let shutdown = registry.shutdown_all();
    let value = result?;
    shutdown?;
    Ok(value)
}

/// Close a database opened with [`init_database`], then hand back `result`.
pub fn close_database<T>(db: Database, result: FlResult<T>) -> FlResult<T> {
    let closed = db.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// A 0..=100 progress bar, hidden for JSON output.
pub fn percent_bar(label: &str, format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {msg:<12} [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(label.to_string());
    pb
}

/// A styled table matching the rest of the CLI output.
pub fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Parse a user-supplied instant.
///
/// Accepts RFC 3339 (`2024-03-01T12:30:00Z`) or a bare date. A bare date
/// means the start of that day in UTC, or its last millisecond when
/// `end_of_day` is set, so date ranges include the whole day.
pub fn parse_instant(input: &str, end_of_day: bool) -> FlResult<DateTime<Utc>> {
    if let Ok(instant) = time::parse_iso(input) {
        return Ok(instant);
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| FlError::Config(format!("cannot parse '{input}' as a date or RFC 3339 time")))?;
    let clock = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| FlError::Internal("invalid time of day".into()))?;
    Ok(date.and_time(clock).and_utc())
}

/// JSON view of a record. The photo itself is summarized, not embedded.
pub fn record_json(record: &FoodRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "comment": record.comment,
        "tags": record.tags,
        "location": record.location,
        "timestamp": time::to_iso(&record.timestamp),
        "favorite": record.favorite,
        "photoType": record.photo.mime_type,
        "photoSize": record.photo.len(),
        "createdAt": time::to_iso(&record.created_at),
        "updatedAt": time::to_iso(&record.updated_at),
    })
}

/// Print `value` as pretty JSON.
pub fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_bare_dates() {
        assert_eq!(
            parse_instant("2024-03-01", false).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        let end = parse_instant("2024-03-01", true).unwrap();
        assert_eq!(end.timestamp_millis() + 1, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap().timestamp_millis());
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(
            parse_instant("2024-03-01T12:30:00Z", true).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
        assert!(parse_instant("last tuesday", false).is_err());
    }

    async fn open_registry(dir: &tempfile::TempDir) -> (ServiceRegistry, Database) {
        let db = Database::open(&dir.path().join("cli.db"), &Default::default()).unwrap();
        let config = ConfigHandle::new(fl_core::config::AppConfig::default());
        let mut registry = ServiceRegistry::new(config, db.clone()).await.unwrap();
        registry.init_all().unwrap();
        (registry, db)
    }

    #[tokio::test]
    async fn test_finish_closes_the_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let (registry, db) = open_registry(&dir).await;
        assert_eq!(finish(registry, Ok(7)).unwrap(), 7);
        assert!(db.is_closed());
    }

    #[tokio::test]
    async fn test_finish_keeps_command_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let (registry, db) = open_registry(&dir).await;
        let err = finish::<()>(registry, Err(FlError::NotFound("food record 9".into()))).unwrap_err();
        assert_eq!(err.kind(), fl_core::ErrorKind::NotFound);
        assert!(db.is_closed());
    }

    #[test]
    fn test_close_database_after_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("cli.db"), &Default::default()).unwrap();
        let handle = db.clone();
        let result = close_database::<()>(db, Err(FlError::Validation("bad".into())));
        assert_eq!(result.unwrap_err().kind(), fl_core::ErrorKind::Validation);
        assert!(handle.is_closed());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long comment", 10), "a rathe...");
        assert_eq!(truncate("ラーメンと餃子", 5), "ラー...");
    }
}
