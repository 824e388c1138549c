//! Portable export document format.
//!
//! An export is a single JSON object: `{version, exportedAt, records}` where
//! each record carries its photo as plain base64 (no data-URI prefix) plus
//! the photo's MIME type, and every instant as an ISO-8601 string. The
//! conversions here are pure; they run inside the data operations worker.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use fl_core::constants::{EXPORT_FORMAT_VERSION, MAX_VALIDATION_ERRORS, VALIDATION_SAMPLE_SIZE};
use fl_core::error::{FlError, FlResult};
use fl_core::time;

use crate::models::food_record::{FoodRecord, Location, NewFoodRecord, Photo};

/// Top-level export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: String,
    pub records: Vec<ExportRecord>,
}

/// One record as written to an export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub photo_base64: String,
    pub photo_type: String,
    pub comment: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub timestamp: String,
    pub favorite: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Outcome of checking an import document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn invalid(errors: Vec<String>) -> Self {
        Self { is_valid: false, errors }
    }
}

/// A record decoded from an export document, ready to be created in the store.
///
/// The exporting store's audit times are not carried over; the importing
/// store stamps fresh ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRecord {
    /// Id the record had in the exporting store. Never reused.
    pub original_id: Option<i64>,
    pub record: NewFoodRecord,
}

/// Decoded records plus the number of entries that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportBatch {
    pub records: Vec<ImportedRecord>,
    pub skipped: usize,
}

/// Per-item progress in percent for item `index` of `total`.
pub fn item_progress(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (((index + 1) as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

// ─── Export ─────────────────────────────────────────────────────────────────

/// Convert one stored record to its export shape.
///
/// Fails with `Encode` when the photo payload is empty or its MIME type is
/// not of the form `type/subtype`.
pub fn export_record(record: &FoodRecord) -> FlResult<ExportRecord> {
    if record.photo.is_empty() {
        return Err(FlError::Encode(format!("record {} has an empty photo", record.id)));
    }
    let mime = record.photo.mime_type.as_str();
    match mime.split_once('/') {
        Some((kind, sub)) if !kind.is_empty() && !sub.is_empty() => {}
        _ => {
            return Err(FlError::Encode(format!(
                "record {} has malformed photo type '{mime}'",
                record.id
            )))
        }
    }

    Ok(ExportRecord {
        id: Some(record.id),
        photo_base64: STANDARD.encode(&record.photo.bytes),
        photo_type: record.photo.mime_type.clone(),
        comment: record.comment.clone(),
        tags: record.tags.clone(),
        location: record.location,
        timestamp: time::to_iso(&record.timestamp),
        favorite: record.favorite,
        created_at: time::to_iso(&record.created_at),
        updated_at: time::to_iso(&record.updated_at),
    })
}

/// Build an export document from `records`, skipping records whose photo
/// cannot be encoded. `progress` receives the per-item percentage.
pub fn export_records(
    records: &[FoodRecord],
    exported_at: DateTime<Utc>,
    progress: &mut dyn FnMut(u8),
) -> ExportDocument {
    let total = records.len();
    let mut out = Vec::with_capacity(total);

    for (i, record) in records.iter().enumerate() {
        progress(item_progress(i, total));
        match export_record(record) {
            Ok(r) => out.push(r),
            Err(e) => warn!(id = record.id, "skipping record in export: {e}"),
        }
    }

    ExportDocument {
        version: EXPORT_FORMAT_VERSION.to_string(),
        exported_at: time::to_iso(&exported_at),
        records: out,
    }
}

// ─── Validation ─────────────────────────────────────────────────────────────

/// Loose truthiness: absent, null, false, zero and the empty string are falsy.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Structurally check an import document.
///
/// Only the first few records are sampled. Errors accumulate within the
/// sample and at most [`MAX_VALIDATION_ERRORS`] are reported, but validity is
/// decided on the full list.
pub fn validate_document(data: &Value) -> ValidationResult {
    let mut errors = Vec::new();

    if !matches!(data, Value::Object(_) | Value::Array(_)) {
        errors.push("Invalid data format".to_string());
        return ValidationResult::invalid(errors);
    }

    if !truthy(data.get("version")) {
        errors.push("Missing version field".to_string());
    }
    if !truthy(data.get("exportedAt")) {
        errors.push("Missing exportedAt field".to_string());
    }

    let records = match data.get("records") {
        Some(Value::Array(records)) => records,
        _ => {
            errors.push("Records must be an array".to_string());
            return ValidationResult::invalid(errors);
        }
    };

    for (i, record) in records.iter().take(VALIDATION_SAMPLE_SIZE).enumerate() {
        if !truthy(record.get("photoBase64")) {
            errors.push(format!("Record {i}: Missing photoBase64"));
        }
        if !truthy(record.get("photoType")) {
            errors.push(format!("Record {i}: Missing photoType"));
        }
        if !matches!(record.get("comment"), Some(Value::String(_))) {
            errors.push(format!("Record {i}: Invalid comment type"));
        }
        if !matches!(record.get("tags"), Some(Value::Array(_))) {
            errors.push(format!("Record {i}: Tags must be an array"));
        }
        if !truthy(record.get("timestamp")) {
            errors.push(format!("Record {i}: Missing timestamp"));
        }
        if !matches!(record.get("favorite"), Some(Value::Bool(_))) {
            errors.push(format!("Record {i}: Invalid favorite type"));
        }
    }

    let is_valid = errors.is_empty();
    errors.truncate(MAX_VALIDATION_ERRORS);
    ValidationResult { is_valid, errors }
}

// ─── Import ─────────────────────────────────────────────────────────────────

/// Decode one export entry into a record ready for insertion.
pub fn import_record(value: &Value) -> FlResult<ImportedRecord> {
    let entry: ExportRecord = serde_json::from_value(value.clone())
        .map_err(|e| FlError::Validation(format!("unexpected record shape: {e}")))?;

    let bytes = STANDARD
        .decode(entry.photo_base64.as_bytes())
        .map_err(|e| FlError::Validation(format!("photo is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(FlError::Validation("photo payload is empty".into()));
    }

    let timestamp = time::parse_iso(&entry.timestamp)?;

    Ok(ImportedRecord {
        original_id: entry.id,
        record: NewFoodRecord {
            photo: Photo::new(bytes, entry.photo_type),
            comment: entry.comment,
            tags: entry.tags,
            location: entry.location,
            timestamp,
            favorite: entry.favorite,
        },
    })
}

/// Decode every record of an import document, skipping entries that fail.
///
/// Fails with `Validation` only when `records` is not an array.
pub fn import_document(data: &Value, progress: &mut dyn FnMut(u8)) -> FlResult<ImportBatch> {
    let entries = data
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| FlError::Validation("Records must be an array".into()))?;

    let total = entries.len();
    let mut batch = ImportBatch::default();

    for (i, entry) in entries.iter().enumerate() {
        progress(item_progress(i, total));
        match import_record(entry) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                let id = entry.get("id").and_then(Value::as_i64);
                warn!(?id, index = i, "skipping record in import: {e}");
                batch.skipped += 1;
            }
        }
    }

    Ok(batch)
}
