//! FoodLog Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other FoodLog crates:
//! - Application configuration (database, logging, compression, export)
//! - Global error taxonomy with a serializable error kind
//! - Structured logging with tracing
//! - Per-user directory lookup
//! - Common constants and time helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod constants;
pub mod time;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{ErrorKind, FlError, FlResult};
pub use logging::init_logging;
