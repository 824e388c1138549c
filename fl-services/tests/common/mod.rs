//! Shared test utilities for integration tests.
#![allow(dead_code)]

use std::io::Cursor;

use chrono::{DateTime, TimeZone, Utc};
use fl_core::config::{AppConfig, ConfigHandle, DatabaseConfig};
use fl_models::{Database, Location, NewFoodRecord, Photo};
use fl_services::event_bus::EventBus;
use fl_services::{DataOperationsService, RecordService};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

/// Create a temporary database with full schema and migrations applied.
/// Returns the Database and the TempDir (must be held alive for the duration of the test).
pub fn create_test_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let config = DatabaseConfig::default();
    let db = Database::open(&path, &config).expect("failed to open test database");
    (db, dir)
}

/// Create a ConfigHandle wrapping a default config.
pub fn create_test_config_handle() -> ConfigHandle {
    ConfigHandle::new(AppConfig::default())
}

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_event_bus() -> EventBus {
    EventBus::new(64)
}

/// Record and data services sharing one temporary store.
pub fn create_test_services() -> (RecordService, DataOperationsService, TempDir) {
    let (db, dir) = create_test_db();
    let bus = create_test_event_bus();
    (RecordService::new(db, bus.clone()), DataOperationsService::new(true, bus), dir)
}

/// Noon UTC on the given day of March 2024.
pub fn march(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// Encode a solid-color image of the given size.
pub fn test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([220, 140, 60, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, format)
        .expect("failed to encode test image");
    out.into_inner()
}

/// A small JPEG photo.
pub fn test_photo() -> Photo {
    Photo::new(test_image(8, 8, ImageFormat::Jpeg), "image/jpeg")
}

/// A record for the given day with a comment and tags.
pub fn meal(day: u32, comment: &str, tags: &[&str]) -> NewFoodRecord {
    let mut record = NewFoodRecord::new(test_photo(), march(day));
    record.comment = comment.to_string();
    record.tags = tags.iter().map(|t| t.to_string()).collect();
    record
}

/// Seed the store with realistic test data.
///
/// Creates six records across March 2024:
/// - day 1: "Ramen at Ichiran" [lunch, noodles], favorite, with location
/// - day 2: "Morning toast" [breakfast]
/// - day 3: "Spicy ramen" [dinner, noodles, spicy]
/// - day 5: "Salad" [lunch, healthy], favorite
/// - day 8: "Curry rice" [dinner, spicy]
/// - day 10: "" [snack, snack] (duplicate tag)
///
/// Returns the assigned ids in creation order.
pub fn seed_test_data(records: &RecordService) -> Vec<i64> {
    let mut ramen = meal(1, "Ramen at Ichiran", &["lunch", "noodles"]);
    ramen.favorite = true;
    ramen.location = Some(Location { lat: 35.6595, lng: 139.7005, accuracy: 12.0 });

    let mut salad = meal(5, "Salad", &["lunch", "healthy"]);
    salad.favorite = true;

    let all = vec![
        ramen,
        meal(2, "Morning toast", &["breakfast"]),
        meal(3, "Spicy ramen", &["dinner", "noodles", "spicy"]),
        salad,
        meal(8, "Curry rice", &["dinner", "spicy"]),
        meal(10, "", &["snack", "snack"]),
    ];

    all.iter()
        .map(|r| records.create(r).expect("failed to seed record"))
        .collect()
}
