//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "FoodLog";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database schema version.
pub const DB_SCHEMA_VERSION: i32 = 1;

/// Version string written into export documents.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Number of leading records structurally checked when validating an import.
pub const VALIDATION_SAMPLE_SIZE: usize = 5;

/// Maximum number of validation errors reported for a single document.
pub const MAX_VALIDATION_ERRORS: usize = 10;

/// Default compression bounds and quality.
pub mod compression {
    pub const DEFAULT_MAX_WIDTH: u32 = 1200;
    pub const DEFAULT_MAX_HEIGHT: u32 = 1200;
    pub const DEFAULT_QUALITY: f32 = 0.8;
}

/// Correlation-id prefixes per request kind.
pub mod request_prefix {
    pub const COMPRESS: &str = "req";
    pub const EXPORT: &str = "export";
    pub const IMPORT: &str = "import";
    pub const VALIDATE: &str = "validate";
}

/// File name used for a backup exported on the given date.
pub fn export_file_name(date: chrono::NaiveDate) -> String {
    format!("foodlog-backup-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_file_name() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "foodlog-backup-2024-03-07.json");
    }
}
