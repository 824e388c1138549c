//! Database initialization, connection pooling, and lifecycle management.
//!
//! Uses SQLite in WAL mode with r2d2 connection pooling.
//! Runs integrity checks on startup and applies versioned migrations.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{error, info, warn};

use fl_core::config::DatabaseConfig;
use fl_core::error::{FlError, FlResult};

use crate::migrations;
use crate::schema;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled connection handed out by [`Database::conn`].
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database wrapper providing initialization, pooling, and lifecycle management.
///
/// Clones share the same pool. After [`Database::close`] every clone refuses
/// to hand out connections.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
    closed: Arc<AtomicBool>,
}

impl Database {
    /// Open the database at the given path with the provided configuration.
    ///
    /// This:
    /// 1. Creates the database file and parent directories if needed
    /// 2. Sets up connection pooling with the PRAGMA customizer
    /// 3. Runs integrity checks if configured
    /// 4. Creates the schema tables
    /// 5. Runs pending migrations
    pub fn open(db_path: &Path, config: &DatabaseConfig) -> FlResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("opening database at {}", db_path.display());

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_customizer(Box::new(ConnectionCustomizer {
                wal_mode: config.wal_mode,
            }))
            .build(manager)
            .map_err(|e| FlError::Pool(e.to_string()))?;

        let db = Self {
            pool: Arc::new(pool),
            closed: Arc::new(AtomicBool::new(false)),
        };

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }

        {
            let conn = db.conn()?;
            schema::create_tables(&conn)?;
            migrations::run_migrations(&conn)?;
        }

        info!("database opened successfully");
        Ok(db)
    }

    /// Get a connection from the pool.
    pub fn conn(&self) -> FlResult<DbConn> {
        if self.is_closed() {
            return Err(FlError::Storage("database is closed".into()));
        }
        self.pool.get().map_err(|e| FlError::Pool(e.to_string()))
    }

    /// Whether [`Database::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Checkpoint the write-ahead log and stop handing out connections.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> FlResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        {
            let conn = self.conn()?;
            if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
                warn!("wal checkpoint on close failed: {e}");
            }
        }
        self.closed.store(true, Ordering::Release);
        info!("database closed");
        Ok(())
    }

    /// Run a SQLite integrity check.
    pub fn run_integrity_check(&self) -> FlResult<()> {
        let conn = self.conn()?;
        let result: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| FlError::Storage(e.to_string()))?;

        if result != "ok" {
            error!("database integrity check failed: {result}");
            return Err(FlError::IntegrityCheck(result));
        }

        info!("database integrity check passed");
        Ok(())
    }

    /// Execute a function within a database transaction.
    ///
    /// The transaction rolls back if `f` returns an error.
    pub fn transaction<T, F>(&self, f: F) -> FlResult<T>
    where
        F: FnOnce(&Connection) -> FlResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let result = f(&tx)?;

        tx.commit()?;

        Ok(result)
    }

    /// Get store statistics.
    pub fn stats(&self) -> FlResult<DatabaseStats> {
        let conn = self.conn()?;

        let scalar = |sql: &str| -> FlResult<i64> {
            conn.query_row(sql, [], |row| row.get(0)).map_err(FlError::from)
        };

        Ok(DatabaseStats {
            records: scalar("SELECT COUNT(*) FROM food_records")?,
            favorites: scalar("SELECT COUNT(*) FROM food_records WHERE favorite = 1")?,
            distinct_tags: scalar("SELECT COUNT(DISTINCT tag) FROM record_tags")?,
            photo_bytes: scalar("SELECT COALESCE(SUM(length(photo)), 0) FROM food_records")?,
        })
    }

    /// Reset the database by dropping and recreating all tables.
    pub fn reset(&self) -> FlResult<()> {
        warn!("resetting database - all data will be lost");
        let conn = self.conn()?;
        schema::drop_tables(&conn)?;
        schema::create_tables(&conn)?;
        migrations::run_migrations(&conn)?;
        info!("database reset complete");
        Ok(())
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStats {
    pub records: i64,
    pub favorites: i64,
    pub distinct_tags: i64,
    pub photo_bytes: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "records={}, favorites={}, tags={}, photo_bytes={}",
            self.records, self.favorites, self.distinct_tags, self.photo_bytes
        )
    }
}

/// r2d2 connection customizer that applies PRAGMA settings.
#[derive(Debug)]
struct ConnectionCustomizer {
    wal_mode: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }

        // Photos make rows large; give the page cache room.
        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA cache_size=-32000;
             PRAGMA busy_timeout=5000;
             PRAGMA foreign_keys=ON;",
        )?;

        Ok(())
    }
}
