//! FoodLog Models - Database schema, models, migrations, and query builders.
//!
//! This crate owns all data persistence: SQLite database lifecycle, the food
//! record model with its multi-entry tag index, versioned migrations, the
//! filtered search query, and the portable export document format.

pub mod db;
pub mod schema;
pub mod models;
pub mod queries;
pub mod migrations;
pub mod export;

// Re-export key types
pub use db::{Database, DatabaseStats, DbConn, DbPool};
pub use models::food_record::{FoodRecord, FoodRecordUpdate, Location, NewFoodRecord, Photo};
pub use queries::SearchFilters;
pub use export::{ExportDocument, ExportRecord, ImportBatch, ImportedRecord, ValidationResult};
