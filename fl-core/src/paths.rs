//! Per-user locations for the FoodLog config file, database and logs.

use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{FlError, FlResult};

fn app_subdir(base: Option<PathBuf>, what: &str) -> FlResult<PathBuf> {
    base.map(|b| b.join(APP_NAME))
        .ok_or_else(|| FlError::Config(format!("could not determine {what} directory")))
}

/// `FoodLog` under the user's data directory (`~/.local/share` on Linux,
/// `~/Library/Application Support` on macOS, `%APPDATA%` on Windows).
pub fn data_dir() -> FlResult<PathBuf> {
    app_subdir(dirs::data_dir(), "data")
}

/// `FoodLog` under the user's config directory.
pub fn config_dir() -> FlResult<PathBuf> {
    app_subdir(dirs::config_dir(), "config")
}
