//! Record service for managing food diary entries.
//!
//! Handles record CRUD operations, favorite toggling, filtered search and
//! store statistics. Every mutation is stamped with the current time and
//! announced on the event bus.

use tracing::{debug, info};

use fl_core::error::FlResult;
use fl_core::time;
use fl_models::queries;
use fl_models::{Database, DatabaseStats, FoodRecord, FoodRecordUpdate, NewFoodRecord, SearchFilters};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState};

/// Service for managing food records in the local store.
pub struct RecordService {
    state: ServiceState,
    database: Database,
    event_bus: EventBus,
}

impl RecordService {
    /// Create a new RecordService.
    pub fn new(database: Database, event_bus: EventBus) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            event_bus,
        }
    }

    /// Store a new record. Returns the assigned id.
    pub fn create(&self, record: &NewFoodRecord) -> FlResult<i64> {
        let conn = self.database.conn()?;
        let id = FoodRecord::insert(&conn, record, time::now())?;
        info!(id, "created food record");
        self.event_bus.emit(AppEvent::RecordCreated { id });
        Ok(id)
    }

    /// Store several records in one transaction. Either all are written or
    /// none are.
    pub fn create_many(&self, records: &[NewFoodRecord]) -> FlResult<Vec<i64>> {
        let now = time::now();
        let ids = self.database.transaction(|conn| {
            records
                .iter()
                .map(|record| FoodRecord::insert(conn, record, now))
                .collect::<FlResult<Vec<_>>>()
        })?;
        info!(count = ids.len(), "created food records in batch");
        Ok(ids)
    }

    /// Merge `update` into record `id`. Fails with `NotFound` for an unknown id.
    pub fn update(&self, id: i64, update: &FoodRecordUpdate) -> FlResult<FoodRecord> {
        let conn = self.database.conn()?;
        let record = FoodRecord::update(&conn, id, update, time::now())?;
        debug!(id, "updated food record");
        self.event_bus.emit(AppEvent::RecordUpdated { id });
        Ok(record)
    }

    /// Permanently delete record `id`. Returns `false` if it did not exist.
    pub fn delete(&self, id: i64) -> FlResult<bool> {
        let conn = self.database.conn()?;
        let deleted = FoodRecord::delete(&conn, id)?;
        if deleted {
            info!(id, "deleted food record");
            self.event_bus.emit(AppEvent::RecordDeleted { id });
        } else {
            debug!(id, "delete of unknown record ignored");
        }
        Ok(deleted)
    }

    pub fn get_by_id(&self, id: i64) -> FlResult<Option<FoodRecord>> {
        let conn = self.database.conn()?;
        FoodRecord::find_by_id(&conn, id)
    }

    /// Every record, newest meal first.
    pub fn get_all(&self) -> FlResult<Vec<FoodRecord>> {
        let conn = self.database.conn()?;
        queries::list_records(&conn)
    }

    /// Records matching all of `filters`, newest meal first.
    pub fn search(&self, filters: &SearchFilters) -> FlResult<Vec<FoodRecord>> {
        let conn = self.database.conn()?;
        let records = queries::search_records(&conn, filters)?;
        debug!(matches = records.len(), "search finished");
        Ok(records)
    }

    /// Flip the favorite flag of record `id`. Returns the new value.
    ///
    /// Read-then-write; concurrent togglers of the same record may race.
    pub fn toggle_favorite(&self, id: i64) -> FlResult<bool> {
        let conn = self.database.conn()?;
        let favorite = FoodRecord::toggle_favorite(&conn, id, time::now())?;
        self.event_bus.emit(AppEvent::FavoriteToggled { id, favorite });
        Ok(favorite)
    }

    pub fn stats(&self) -> FlResult<DatabaseStats> {
        self.database.stats()
    }

    /// Tag frequencies, most used first.
    pub fn tag_counts(&self) -> FlResult<Vec<(String, i64)>> {
        let conn = self.database.conn()?;
        queries::tag_counts(&conn)
    }
}

impl Service for RecordService {
    fn name(&self) -> &str {
        "records"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> FlResult<()> {
        // Fail early if the store is unusable.
        let conn = self.database.conn()?;
        conn.query_row("SELECT COUNT(*) FROM food_records", [], |row| row.get::<_, i64>(0))?;
        self.state = ServiceState::Running;
        info!("record service initialized");
        Ok(())
    }

    fn shutdown(&mut self) -> FlResult<()> {
        self.state = ServiceState::Stopped;
        info!("record service shut down");
        Ok(())
    }
}
