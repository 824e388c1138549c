//! End-to-end event flow integration tests.
//!
//! Tests that record mutations, imports and exports driven through the
//! service registry reach event bus subscribers in order.

mod common;

use std::time::Duration;

use fl_models::FoodRecordUpdate;
use fl_services::event_bus::AppEvent;
use fl_services::ServiceRegistry;

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

#[tokio::test]
async fn record_lifecycle_emits_events_in_order() {
    let (db, _dir) = common::create_test_db();
    let mut registry = ServiceRegistry::new(common::create_test_config_handle(), db).await.unwrap();
    registry.init_all().unwrap();
    let mut rx = registry.event_bus().subscribe();

    let records = registry.records();
    let id = records.create(&common::meal(1, "udon", &["noodles"])).unwrap();
    records
        .update(id, &FoodRecordUpdate { comment: Some("kake udon".into()), ..Default::default() })
        .unwrap();
    records.toggle_favorite(id).unwrap();
    records.delete(id).unwrap();

    assert_eq!(next_event(&mut rx).await, AppEvent::RecordCreated { id });
    assert_eq!(next_event(&mut rx).await, AppEvent::RecordUpdated { id });
    assert_eq!(next_event(&mut rx).await, AppEvent::FavoriteToggled { id, favorite: true });
    assert_eq!(next_event(&mut rx).await, AppEvent::RecordDeleted { id });

    registry.shutdown_all().unwrap();
}

#[tokio::test]
async fn backup_round_trip_through_registry() {
    let (db, _dir) = common::create_test_db();
    let mut registry = ServiceRegistry::new(common::create_test_config_handle(), db).await.unwrap();
    registry.init_all().unwrap();
    common::seed_test_data(registry.records());
    let mut rx = registry.event_bus().subscribe();

    let text = registry.data_ops().export_all(registry.records(), |_| {}).await.unwrap();
    assert_eq!(next_event(&mut rx).await, AppEvent::ExportCompleted { records: 6 });

    registry.records().create(&common::meal(20, "extra", &[])).unwrap();
    assert!(matches!(next_event(&mut rx).await, AppEvent::RecordCreated { .. }));

    let summary = registry
        .data_ops()
        .import_text(&text, registry.records(), |_| {})
        .await
        .unwrap();
    assert_eq!(summary.imported, 6);
    assert_eq!(next_event(&mut rx).await, AppEvent::ImportCompleted { imported: 6, skipped: 0 });
    assert_eq!(registry.records().stats().unwrap().records, 13);

    registry.shutdown_all().unwrap();
    assert!(registry.records().get_all().is_err());
}
