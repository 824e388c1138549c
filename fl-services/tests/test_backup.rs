//! Integration tests for backup export, validation and import.
//!
//! Tests the full document round trip between two stores, skipping of
//! undecodable records on both sides, validation messages, and that progress
//! for concurrent requests stays with the request that produced it.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};

use fl_core::ErrorKind;
use fl_models::{FoodRecord, Photo};

fn stored(id: i64, photo: Photo) -> FoodRecord {
    let now = Utc::now();
    FoodRecord {
        id,
        photo,
        comment: format!("record {id}"),
        tags: vec!["t".into()],
        location: None,
        timestamp: common::march(1),
        favorite: false,
        created_at: now,
        updated_at: now,
    }
}

fn document(records: Value) -> String {
    json!({"version": "1.0", "exportedAt": "2024-03-11T09:00:00.000Z", "records": records}).to_string()
}

fn valid_entry(comment: &str) -> Value {
    json!({
        "photoBase64": STANDARD.encode(common::test_photo().bytes),
        "photoType": "image/jpeg",
        "comment": comment,
        "tags": ["imported"],
        "timestamp": "2024-03-04T12:00:00.000Z",
        "favorite": false,
        "createdAt": "2024-03-04T12:00:00.000Z",
        "updatedAt": "2024-03-04T12:00:00.000Z"
    })
}

// ---- Round trip ----

#[tokio::test]
async fn export_then_import_preserves_everything_but_store_fields() {
    let (source, data, _dir) = common::create_test_services();
    common::seed_test_data(&source);

    let text = data.export_all(&source, |_| {}).await.unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["version"], "1.0");
    assert_eq!(doc["records"].as_array().unwrap().len(), 6);
    assert!(text.contains("\n  \"version\""), "expected two-space indentation");

    let (target, target_data, _dir2) = common::create_test_services();
    let summary = target_data.import_text(&text, &target, |_| {}).await.unwrap();
    assert_eq!(summary.imported, 6);
    assert_eq!(summary.skipped, 0);

    let before = source.get_all().unwrap();
    let after = target.get_all().unwrap();
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.photo, b.photo);
        assert_eq!(a.comment, b.comment);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.location, b.location);
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(a.favorite, b.favorite);
    }
}

#[tokio::test]
async fn import_appends_with_fresh_ids() {
    let (records, data, _dir) = common::create_test_services();
    let ids = common::seed_test_data(&records);

    let text = data.export_all(&records, |_| {}).await.unwrap();
    data.import_text(&text, &records, |_| {}).await.unwrap();

    let all = records.get_all().unwrap();
    assert_eq!(all.len(), 12);
    let max_original = ids.iter().copied().max().unwrap();
    assert_eq!(all.iter().filter(|r| r.id > max_original).count(), 6);
}

#[tokio::test]
async fn imported_records_get_fresh_audit_times() {
    let (records, data, _dir) = common::create_test_services();
    let mut entry = valid_entry("old");
    entry["id"] = json!(7);
    entry["createdAt"] = json!("2020-03-01T08:00:00.000Z");
    entry["updatedAt"] = json!("2020-03-02T08:00:00.000Z");

    let before = fl_core::time::now();
    data.import_text(&document(json!([entry])), &records, |_| {}).await.unwrap();

    let imported = records.get_all().unwrap().remove(0);
    assert_eq!(imported.id, 1);
    assert!(imported.created_at >= before);
    assert_eq!(imported.created_at, imported.updated_at);
}

#[tokio::test]
async fn absent_location_and_id_are_omitted() {
    let (records, data, _dir) = common::create_test_services();
    records.create(&common::meal(2, "toast", &[])).unwrap();
    let doc = data.export_records(records.get_all().unwrap(), |_| {}).await.unwrap();
    let value = serde_json::to_value(&doc).unwrap();
    let entry = &value["records"][0];
    assert!(entry.get("location").is_none());
    assert!(entry.get("id").is_some());
    assert!(!entry["photoBase64"].as_str().unwrap().starts_with("data:"));
}

// ---- Partial failures ----

#[tokio::test]
async fn export_skips_records_with_unencodable_photos() {
    let (_records, data, _dir) = common::create_test_services();
    let batch = vec![
        stored(1, common::test_photo()),
        stored(2, Photo::new(Vec::new(), "image/jpeg")),
        stored(3, common::test_photo()),
    ];

    let mut progress = Vec::new();
    let doc = data.export_records(batch, |p| progress.push(p)).await.unwrap();

    let ids: Vec<_> = doc.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![Some(1), Some(3)]);
    assert_eq!(progress, vec![0, 33, 67, 100]);
}

#[tokio::test]
async fn import_skips_undecodable_entries() {
    let (records, data, _dir) = common::create_test_services();
    let mut bad_time = valid_entry("bad time");
    bad_time["timestamp"] = json!("yesterday-ish");
    let mut bad_photo = valid_entry("bad photo");
    bad_photo["photoBase64"] = json!("@@not base64@@");

    let text = document(json!([valid_entry("one"), bad_time, bad_photo, valid_entry("two")]));
    let summary = data.import_text(&text, &records, |_| {}).await.unwrap();

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 2);
    let mut comments: Vec<_> = records.get_all().unwrap().into_iter().map(|r| r.comment).collect();
    comments.sort();
    assert_eq!(comments, vec!["one", "two"]);
}

// ---- Validation ----

#[tokio::test]
async fn missing_records_is_invalid_and_imports_nothing() {
    let (records, data, _dir) = common::create_test_services();
    let text = json!({"version": "1.0", "exportedAt": "2024-03-11T09:00:00.000Z"}).to_string();

    let result = data.validate_text(&text).await.unwrap();
    assert!(!result.is_valid);
    assert!(!result.errors.is_empty());

    let err = data.import_text(&text, &records, |_| {}).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(records.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn validation_is_idempotent() {
    let (_records, data, _dir) = common::create_test_services();
    let mut broken = valid_entry("x");
    broken["favorite"] = json!("yes");
    broken.as_object_mut().unwrap().remove("photoType");
    let text = document(json!([broken]));

    let first = data.validate_text(&text).await.unwrap();
    let second = data.validate_text(&text).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.errors,
        vec!["Record 0: Missing photoType", "Record 0: Invalid favorite type"]
    );
}

#[tokio::test]
async fn validation_reports_top_level_problems() {
    let (_records, data, _dir) = common::create_test_services();

    let not_object = data.validate_text("42").await.unwrap();
    assert_eq!(not_object.errors, vec!["Invalid data format"]);

    let bare = data.validate_text(r#"{"records": []}"#).await.unwrap();
    assert_eq!(bare.errors, vec!["Missing version field", "Missing exportedAt field"]);

    let not_json = data.validate_text("{").await.unwrap();
    assert_eq!(not_json.errors, vec!["Invalid JSON format"]);
}

#[tokio::test]
async fn validation_errors_are_capped() {
    let (_records, data, _dir) = common::create_test_services();
    let entries: Vec<Value> = (0..8).map(|_| json!({})).collect();
    let result = data.validate_text(&document(Value::Array(entries))).await.unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 10);
    assert_eq!(result.errors[0], "Record 0: Missing photoBase64");
}

#[tokio::test]
async fn import_of_bad_json_is_a_validation_error() {
    let (records, data, _dir) = common::create_test_services();
    let err = data.import_text("not json", &records, |_| {}).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.detail(), "Invalid JSON format");
}

// ---- Progress isolation ----

#[tokio::test]
async fn concurrent_requests_keep_their_own_progress() {
    let (_records, data, _dir) = common::create_test_services();
    let four: Vec<_> = (1..=4).map(|id| stored(id, common::test_photo())).collect();
    let two: Vec<_> = (5..=6).map(|id| stored(id, common::test_photo())).collect();

    let mut p_four = Vec::new();
    let mut p_two = Vec::new();
    let (a, b) = tokio::join!(
        data.export_records(four, |p| p_four.push(p)),
        data.export_records(two, |p| p_two.push(p)),
    );

    assert_eq!(a.unwrap().records.len(), 4);
    assert_eq!(b.unwrap().records.len(), 2);
    assert_eq!(p_four, vec![0, 25, 50, 75, 100]);
    assert_eq!(p_two, vec![0, 50, 100]);
}
