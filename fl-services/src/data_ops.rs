//! Backup export, import and validation.
//!
//! The document conversions run on a dedicated worker so a large backup does
//! not stall the caller. The store reads and writes stay on the caller's
//! side: export reads every record before handing them to the worker, import
//! writes the decoded records in a single transaction afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use fl_core::constants::export_file_name;
use fl_core::error::{FlError, FlResult};
use fl_core::time;
use fl_models::export::{self, ExportDocument, ImportBatch, ValidationResult};
use fl_models::{FoodRecord, NewFoodRecord};
use fl_worker::{Job, ProgressReporter, RequestKind, WorkerHandle};

use crate::event_bus::{AppEvent, EventBus};
use crate::record::RecordService;
use crate::service::{Service, ServiceState};

const INVALID_JSON: &str = "Invalid JSON format";

/// Requests understood by [`DataOperationsJob`].
pub enum DataRequest {
    Export {
        records: Vec<FoodRecord>,
        exported_at: DateTime<Utc>,
    },
    Import(Value),
    Validate(Value),
}

/// Successful outcomes of a [`DataRequest`], one variant per request kind.
#[derive(Debug)]
pub enum DataResponse {
    Exported(ExportDocument),
    Imported(ImportBatch),
    Validated(ValidationResult),
}

/// Worker job for the document conversions.
#[derive(Default)]
pub struct DataOperationsJob;

impl Job for DataOperationsJob {
    type Request = DataRequest;
    type Output = DataResponse;

    fn kind(request: &Self::Request) -> RequestKind {
        match request {
            DataRequest::Export { .. } => RequestKind::Export,
            DataRequest::Import(_) => RequestKind::Import,
            DataRequest::Validate(_) => RequestKind::Validate,
        }
    }

    fn handle(&mut self, request: Self::Request, progress: &ProgressReporter<'_>) -> FlResult<Self::Output> {
        match request {
            DataRequest::Export { records, exported_at } => {
                progress.report(0);
                let doc = export::export_records(&records, exported_at, &mut |p| progress.report(p));
                Ok(DataResponse::Exported(doc))
            }
            DataRequest::Import(data) => {
                progress.report(0);
                let batch = export::import_document(&data, &mut |p| progress.report(p))?;
                Ok(DataResponse::Imported(batch))
            }
            DataRequest::Validate(data) => Ok(DataResponse::Validated(export::validate_document(&data))),
        }
    }
}

/// Result of importing one backup document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} imported, {} skipped", self.imported, self.skipped)
    }
}

fn unexpected(response: DataResponse) -> FlError {
    FlError::Internal(format!("unexpected data worker response: {response:?}"))
}

/// Service for backing up and restoring the record store.
pub struct DataOperationsService {
    state: ServiceState,
    pretty: bool,
    worker: WorkerHandle<DataOperationsJob>,
    event_bus: EventBus,
}

impl DataOperationsService {
    /// Create the service. `pretty` selects two-space indented output.
    pub fn new(pretty: bool, event_bus: EventBus) -> Self {
        Self {
            state: ServiceState::Created,
            pretty,
            worker: WorkerHandle::new("data", DataOperationsJob::default),
            event_bus,
        }
    }

    /// Build an export document from `records` on the worker.
    pub async fn export_records(
        &self,
        records: Vec<FoodRecord>,
        on_progress: impl FnMut(u8),
    ) -> FlResult<ExportDocument> {
        let request = DataRequest::Export { records, exported_at: time::now() };
        match self.worker.call(request, on_progress).await? {
            DataResponse::Exported(doc) => Ok(doc),
            other => Err(unexpected(other)),
        }
    }

    /// Export every stored record as a JSON document.
    pub async fn export_all(&self, records: &RecordService, on_progress: impl FnMut(u8)) -> FlResult<String> {
        let all = records.get_all()?;
        let total = all.len();
        let doc = self.export_records(all, on_progress).await?;
        if doc.records.len() < total {
            warn!(
                exported = doc.records.len(),
                skipped = total - doc.records.len(),
                "some records could not be exported"
            );
        }

        let text = if self.pretty {
            serde_json::to_string_pretty(&doc)?
        } else {
            serde_json::to_string(&doc)?
        };
        info!(records = doc.records.len(), bytes = text.len(), "export finished");
        self.event_bus.emit(AppEvent::ExportCompleted { records: doc.records.len() });
        Ok(text)
    }

    /// Structurally check an already parsed document on the worker.
    pub async fn validate(&self, data: Value) -> FlResult<ValidationResult> {
        match self.worker.call(DataRequest::Validate(data), |_| {}).await? {
            DataResponse::Validated(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Check a document given as text. Unparsable JSON is reported as an
    /// invalid result rather than an error.
    pub async fn validate_text(&self, text: &str) -> FlResult<ValidationResult> {
        match serde_json::from_str::<Value>(text) {
            Ok(data) => self.validate(data).await,
            Err(e) => {
                warn!("validation input is not JSON: {e}");
                Ok(ValidationResult {
                    is_valid: false,
                    errors: vec![INVALID_JSON.to_string()],
                })
            }
        }
    }

    /// Decode the records of an already parsed document on the worker.
    pub async fn import_records(&self, data: Value, on_progress: impl FnMut(u8)) -> FlResult<ImportBatch> {
        match self.worker.call(DataRequest::Import(data), on_progress).await? {
            DataResponse::Imported(batch) => Ok(batch),
            other => Err(unexpected(other)),
        }
    }

    /// Validate, decode and store every record of a backup document.
    ///
    /// Imported records always get fresh ids. Nothing is written when the
    /// document is invalid, and the store writes share one transaction.
    pub async fn import_text(
        &self,
        text: &str,
        records: &RecordService,
        on_progress: impl FnMut(u8),
    ) -> FlResult<ImportSummary> {
        let data: Value =
            serde_json::from_str(text).map_err(|_| FlError::Validation(INVALID_JSON.to_string()))?;

        let validation = self.validate(data.clone()).await?;
        if !validation.is_valid {
            warn!(errors = validation.errors.len(), "refusing to import invalid document");
            return Err(FlError::Validation(validation.errors.join("; ")));
        }

        let batch = self.import_records(data, on_progress).await?;
        let (original_ids, new_records): (Vec<Option<i64>>, Vec<NewFoodRecord>) =
            batch.records.into_iter().map(|r| (r.original_id, r.record)).unzip();
        let ids = records.create_many(&new_records)?;
        for (original_id, id) in original_ids.iter().zip(&ids) {
            debug!(?original_id, id, "imported record");
        }

        let summary = ImportSummary { imported: ids.len(), skipped: batch.skipped };
        info!(%summary, "import finished");
        self.event_bus.emit(AppEvent::ImportCompleted {
            imported: summary.imported,
            skipped: summary.skipped,
        });
        Ok(summary)
    }

    /// Suggested file name for a backup taken at `now`.
    pub fn export_file_name(&self, now: DateTime<Utc>) -> String {
        export_file_name(now.date_naive())
    }
}

impl Service for DataOperationsService {
    fn name(&self) -> &str {
        "data_operations"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> FlResult<()> {
        self.state = ServiceState::Running;
        info!("data operations service initialized");
        Ok(())
    }

    fn shutdown(&mut self) -> FlResult<()> {
        self.worker.terminate();
        self.state = ServiceState::Stopped;
        info!("data operations service shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_request_kinds() {
        assert_eq!(DataOperationsJob::kind(&DataRequest::Validate(Value::Null)), RequestKind::Validate);
        assert_eq!(DataOperationsJob::kind(&DataRequest::Import(Value::Null)), RequestKind::Import);
    }

    #[test]
    fn test_export_file_name() {
        let svc = DataOperationsService::new(true, EventBus::new(8));
        let now = Utc.with_ymd_and_hms(2024, 7, 9, 23, 59, 0).unwrap();
        assert_eq!(svc.export_file_name(now), "foodlog-backup-2024-07-09.json");
    }

    #[tokio::test]
    async fn test_validate_text_bad_json() {
        let svc = DataOperationsService::new(true, EventBus::new(8));
        let result = svc.validate_text("{not json").await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Invalid JSON format"]);
    }

    #[tokio::test]
    async fn test_validate_on_worker() {
        let svc = DataOperationsService::new(true, EventBus::new(8));
        let result = svc
            .validate(json!({"version": "1.0", "exportedAt": "2024-01-01T00:00:00.000Z"}))
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Records must be an array"]);
    }

    #[tokio::test]
    async fn test_import_progress_starts_at_zero() {
        let svc = DataOperationsService::new(true, EventBus::new(8));
        let mut seen = Vec::new();
        let batch = svc
            .import_records(
                json!({"version": "1.0", "exportedAt": "x", "records": [{"bogus": true}]}),
                |p| seen.push(p),
            )
            .await
            .unwrap();
        assert_eq!(batch.skipped, 1);
        assert_eq!(seen, vec![0, 100]);
    }
}
