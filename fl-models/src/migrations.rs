//! Versioned database migrations.
//!
//! Migrations run sequentially from the current stored version to the latest.
//! Each migration is idempotent.

use rusqlite::{params, Connection};
use tracing::{info, warn};
use fl_core::error::{FlError, FlResult};
use fl_core::constants::DB_SCHEMA_VERSION;

/// Run all pending migrations on the database.
pub fn run_migrations(conn: &Connection) -> FlResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= DB_SCHEMA_VERSION {
        info!("database schema is up to date (version {current_version})");
        return Ok(());
    }

    info!("running migrations from version {current_version} to {DB_SCHEMA_VERSION}");

    for version in (current_version + 1)..=DB_SCHEMA_VERSION {
        run_migration(conn, version)?;
    }

    set_schema_version(conn, DB_SCHEMA_VERSION)?;
    info!("migrations complete, schema at version {DB_SCHEMA_VERSION}");
    Ok(())
}

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> FlResult<i32> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| FlError::Migration(e.to_string()))?;

    if count == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])
            .map_err(|e| FlError::Migration(e.to_string()))?;
        return Ok(0);
    }

    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .map_err(|e| FlError::Migration(e.to_string()))
}

fn set_schema_version(conn: &Connection, version: i32) -> FlResult<()> {
    conn.execute("UPDATE schema_version SET version = ?1", [version])
        .map_err(|e| FlError::Migration(e.to_string()))?;
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> FlResult<()> {
    info!("applying migration version {version}");

    match version {
        1 => migration_v1(conn),
        _ => {
            warn!("unknown migration version {version}, skipping");
            Ok(())
        }
    }
}

/// Migration v1: the tables come from `schema::create_tables`; make sure the
/// tag index agrees with the `tags` column of every existing record.
fn migration_v1(conn: &Connection) -> FlResult<()> {
    let rebuilt = rebuild_tag_index(conn)?;
    if rebuilt > 0 {
        info!("indexed tags for {rebuilt} existing record(s)");
    }
    Ok(())
}

/// Repopulate `record_tags` from the `tags` JSON column.
///
/// Returns the number of records indexed.
pub fn rebuild_tag_index(conn: &Connection) -> FlResult<usize> {
    let rows: Vec<(i64, String)> = {
        let mut stmt = conn
            .prepare("SELECT id, tags FROM food_records")
            .map_err(|e| FlError::Migration(e.to_string()))?;
        let mapped = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| FlError::Migration(e.to_string()))?;
        mapped
            .collect::<Result<_, _>>()
            .map_err(|e| FlError::Migration(e.to_string()))?
    };

    conn.execute("DELETE FROM record_tags", [])
        .map_err(|e| FlError::Migration(e.to_string()))?;

    for (id, tags_json) in &rows {
        let tags: Vec<String> = match serde_json::from_str(tags_json) {
            Ok(tags) => tags,
            Err(e) => {
                warn!("record {id} has unreadable tags ({e}), leaving it unindexed");
                continue;
            }
        };
        for (position, tag) in tags.iter().enumerate() {
            conn.execute(
                "INSERT INTO record_tags (record_id, position, tag) VALUES (?1, ?2, ?3)",
                params![id, position as i64, tag],
            )
            .map_err(|e| FlError::Migration(e.to_string()))?;
        }
    }

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn test_migrations_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_rebuild_tag_index_from_json_column() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO food_records (photo, photo_type, tags, timestamp_ms, created_at_ms, updated_at_ms)
             VALUES (x'FF', 'image/jpeg', '[\"lunch\",\"ramen\",\"lunch\"]', 0, 0, 0)",
            [],
        )
        .unwrap();

        assert_eq!(rebuild_tag_index(&conn).unwrap(), 1);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM record_tags WHERE tag = 'lunch'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
