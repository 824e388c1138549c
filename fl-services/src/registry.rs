//! Service registry for dependency injection and lifecycle management.
//!
//! The registry builds every service from the shared infrastructure,
//! initializes them in order, hands out typed references, and handles
//! ordered shutdown.

use tracing::{error, info};

use fl_core::config::ConfigHandle;
use fl_core::error::FlResult;
use fl_imaging::CompressionOptions;
use fl_models::Database;

use crate::compression::CompressionService;
use crate::data_ops::DataOperationsService;
use crate::event_bus::EventBus;
use crate::record::RecordService;
use crate::service::{Service, ServiceState};

/// Central registry owning all application services.
///
/// Holds the core infrastructure (database, config, event bus) and the
/// services built on top of it. Initialization runs in dependency order:
/// records, compression, data operations.
pub struct ServiceRegistry {
    /// Application configuration.
    pub config: ConfigHandle,
    /// Database connection pool.
    pub database: Database,
    /// Application-level event bus.
    pub event_bus: EventBus,
    records: RecordService,
    compression: CompressionService,
    data_ops: DataOperationsService,
}

impl ServiceRegistry {
    /// Build all services from the current configuration.
    pub async fn new(config: ConfigHandle, database: Database) -> FlResult<Self> {
        let snapshot = config.snapshot().await;
        let event_bus = EventBus::new(256);

        let options = CompressionOptions::from_config(&snapshot.compression)?;
        let compression = CompressionService::new(
            options,
            snapshot.compression.use_background_worker,
            event_bus.clone(),
        );
        let records = RecordService::new(database.clone(), event_bus.clone());
        let data_ops = DataOperationsService::new(snapshot.export.pretty, event_bus.clone());

        info!("registered 3 services");
        Ok(Self {
            config,
            database,
            event_bus,
            records,
            compression,
            data_ops,
        })
    }

    fn services(&self) -> [&dyn Service; 3] {
        [&self.records, &self.compression, &self.data_ops]
    }

    fn services_mut(&mut self) -> [&mut dyn Service; 3] {
        [&mut self.records, &mut self.compression, &mut self.data_ops]
    }

    /// Initialize all services in order.
    pub fn init_all(&mut self) -> FlResult<()> {
        info!("initializing {} services", self.service_count());

        for svc in self.services_mut() {
            let name = svc.name().to_string();
            info!("initializing service: {name}");
            if let Err(e) = svc.init() {
                error!(kind = ?e.kind(), "failed to initialize service {name}: {e}");
                return Err(e);
            }
        }

        info!("all services initialized");
        Ok(())
    }

    /// Shut down all services in reverse order, then close the database.
    pub fn shutdown_all(&mut self) -> FlResult<()> {
        info!("shutting down services");

        let mut services = self.services_mut();
        services.reverse();
        for svc in services {
            let name = svc.name().to_string();
            info!("shutting down service: {name}");
            if let Err(e) = svc.shutdown() {
                error!("error shutting down service {name}: {e}");
                // Continue shutting down other services
            }
        }

        self.database.close()?;
        info!("all services shut down");
        Ok(())
    }

    pub fn records(&self) -> &RecordService {
        &self.records
    }

    pub fn compression(&self) -> &CompressionService {
        &self.compression
    }

    pub fn data_ops(&self) -> &DataOperationsService {
        &self.data_ops
    }

    /// Get a reference to the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Get the health status of all services.
    pub fn health_check(&self) -> Vec<(String, ServiceState, bool)> {
        self.services()
            .iter()
            .map(|svc| (svc.name().to_string(), svc.state(), svc.is_healthy()))
            .collect()
    }

    /// Get the number of registered services.
    pub fn service_count(&self) -> usize {
        self.services().len()
    }
}
