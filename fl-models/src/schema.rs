//! Database schema definitions and table creation.
//!
//! One collection of food records plus a `record_tags` table acting as the
//! multi-entry tag index. Indexes cover the access paths the store needs:
//! primary id, timestamp range scans, tag membership, the favorite flag, and
//! the compound favorite + timestamp ordering.

use rusqlite::Connection;
use fl_core::error::{FlError, FlResult};
use tracing::info;

/// Create all database tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> FlResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| FlError::Storage(format!("failed to create schema: {e}")))?;
    info!("database schema verified");
    Ok(())
}

/// Drop all tables (used for database reset).
pub fn drop_tables(conn: &Connection) -> FlResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS record_tags;
         DROP TABLE IF EXISTS food_records;
         DROP TABLE IF EXISTS schema_version;",
    )
    .map_err(|e| FlError::Storage(format!("failed to drop tables: {e}")))?;
    Ok(())
}

/// Complete SQL schema for all tables.
const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Food records. Instants are unix milliseconds.
CREATE TABLE IF NOT EXISTS food_records (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    photo               BLOB NOT NULL CHECK (length(photo) > 0),
    photo_type          TEXT NOT NULL,
    comment             TEXT NOT NULL DEFAULT '',
    tags                TEXT NOT NULL DEFAULT '[]',
    location_lat        REAL,
    location_lng        REAL,
    location_accuracy   REAL,
    timestamp_ms        INTEGER NOT NULL,
    favorite            INTEGER NOT NULL DEFAULT 0,
    created_at_ms       INTEGER NOT NULL,
    updated_at_ms       INTEGER NOT NULL,
    CHECK (created_at_ms <= updated_at_ms)
);

CREATE INDEX IF NOT EXISTS idx_food_records_timestamp ON food_records(timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_food_records_favorite ON food_records(favorite);
CREATE INDEX IF NOT EXISTS idx_food_records_favorite_timestamp ON food_records(favorite, timestamp_ms);

-- Multi-entry tag index. `position` keeps the record's tag order and lets
-- duplicate tags on one record coexist.
CREATE TABLE IF NOT EXISTS record_tags (
    record_id   INTEGER NOT NULL REFERENCES food_records(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    tag         TEXT NOT NULL,
    PRIMARY KEY (record_id, position)
);

CREATE INDEX IF NOT EXISTS idx_record_tags_tag ON record_tags(tag, record_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert!(object_exists(&conn, "table", "food_records"));
        assert!(object_exists(&conn, "table", "record_tags"));
        assert!(object_exists(&conn, "index", "idx_food_records_favorite_timestamp"));
        assert!(object_exists(&conn, "index", "idx_record_tags_tag"));
    }

    #[test]
    fn test_empty_photo_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO food_records (photo, photo_type, timestamp_ms, created_at_ms, updated_at_ms)
             VALUES (x'', 'image/jpeg', 0, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        drop_tables(&conn).unwrap();
        assert!(!object_exists(&conn, "table", "food_records"));
    }
}
