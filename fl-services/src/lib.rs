//! FoodLog Services - Business logic and service layer.
//!
//! This crate provides the service trait, the service registry and every
//! concrete service behind the `foodlog` front end:
//! - Record management (create, edit, favorite, delete, search, statistics)
//! - Photo compression on a background worker with a same-thread fallback
//! - Backup export, import and validation on a background worker
//! - Event bus (typed intra-service communication)

pub mod service;
pub mod registry;
pub mod event_bus;
pub mod record;
pub mod compression;
pub mod data_ops;

// Re-export key types
pub use service::{Service, ServiceState};
pub use registry::ServiceRegistry;
pub use event_bus::{AppEvent, EventBus};
pub use record::RecordService;
pub use compression::{CompressionJob, CompressionService, ExecutionStrategy};
pub use data_ops::{DataOperationsJob, DataOperationsService, ImportSummary};
