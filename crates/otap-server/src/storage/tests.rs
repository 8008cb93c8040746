//! Storage layer tests for the OTAP registry.
#![allow(clippy::unwrap_used)]

use super::db::Database;
use super::models::NewVersionCheck;

async fn test_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

// === Device registry ===

#[tokio::test]
async fn upsert_creates_device() {
    let db = test_db().await;
    let device = db
        .upsert_device("123456789012345", "ACME", Some("PM"))
        .await
        .unwrap();

    assert_eq!(device.imei, "123456789012345");
    assert_eq!(device.custid, "ACME");
    assert_eq!(device.tid.as_deref(), Some("PM"));
    assert_eq!(device.block, 0);
    assert!(device.reported.is_none());
    assert!(device.deliver.is_none());
}

#[tokio::test]
async fn upsert_is_idempotent_and_unblocks() {
    let db = test_db().await;
    db.upsert_device("123456789012345", "ACME", Some("PM"))
        .await
        .unwrap();
    db.set_block("123456789012345", true).await.unwrap();

    let again = db
        .upsert_device("123456789012345", "ACME", Some("PM"))
        .await
        .unwrap();
    assert_eq!(again.block, 0, "add must clear the block flag");

    let all = db.list_devices(None).await.unwrap();
    assert_eq!(all.len(), 1, "upsert must never duplicate a row");
}

#[tokio::test]
async fn scoped_lookup_requires_matching_custid() {
    let db = test_db().await;
    db.upsert_device("123456789012345", "ACME", Some("PM"))
        .await
        .unwrap();

    assert!(db
        .get_device_scoped("123456789012345", "ACME")
        .await
        .unwrap()
        .is_some());
    assert!(db
        .get_device_scoped("123456789012345", "OTHER")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn set_deliver_unknown_imei_reports_missing() {
    let db = test_db().await;
    let found = db.set_deliver("000000000000000", Some("1.0.0")).await.unwrap();
    assert!(!found);
}

#[tokio::test]
async fn set_reported_roundtrip() {
    let db = test_db().await;
    db.upsert_device("123456789012345", "ACME", None)
        .await
        .unwrap();
    db.set_reported("123456789012345", "0.8.37").await.unwrap();

    let device = db.get_device("123456789012345").await.unwrap().unwrap();
    assert_eq!(device.reported.as_deref(), Some("0.8.37"));
}

#[tokio::test]
async fn block_all_touches_every_row() {
    let db = test_db().await;
    db.upsert_device("111111111111111", "ACME", Some("AA"))
        .await
        .unwrap();
    db.upsert_device("222222222222222", "ACME", Some("BB"))
        .await
        .unwrap();

    let updated = db.set_block_all(true).await.unwrap();
    assert_eq!(updated, 2);

    for device in db.list_devices(None).await.unwrap() {
        assert!(device.is_blocked());
    }
}

#[tokio::test]
async fn list_devices_orders_by_tid() {
    let db = test_db().await;
    db.upsert_device("222222222222222", "ACME", Some("ZZ"))
        .await
        .unwrap();
    db.upsert_device("111111111111111", "ACME", Some("AA"))
        .await
        .unwrap();

    let all = db.list_devices(None).await.unwrap();
    assert_eq!(all[0].tid.as_deref(), Some("AA"));
    assert_eq!(all[1].tid.as_deref(), Some("ZZ"));
}

#[tokio::test]
async fn find_by_tid_orders_by_imei() {
    let db = test_db().await;
    db.upsert_device("999999999999999", "ACME", Some("PM"))
        .await
        .unwrap();
    db.upsert_device("111111111111111", "ACME", Some("PM"))
        .await
        .unwrap();
    db.upsert_device("555555555555555", "ACME", Some("XX"))
        .await
        .unwrap();

    let found = db.find_by_tid("PM").await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].imei, "111111111111111");
    assert_eq!(found[1].imei, "999999999999999");
}

#[tokio::test]
async fn count_targeting_counts_exact_matches_only() {
    let db = test_db().await;
    db.upsert_device("111111111111111", "ACME", None)
        .await
        .unwrap();
    db.upsert_device("222222222222222", "ACME", None)
        .await
        .unwrap();
    db.upsert_device("333333333333333", "ACME", None)
        .await
        .unwrap();
    db.set_deliver("111111111111111", Some("1.2.0")).await.unwrap();
    db.set_deliver("222222222222222", Some("*")).await.unwrap();

    assert_eq!(db.count_targeting("1.2.0").await.unwrap(), 1);
    assert_eq!(db.count_wildcard().await.unwrap(), 1);
    assert_eq!(db.count_targeting("9.9.9").await.unwrap(), 0);
}

// === Audit log ===

#[tokio::test]
async fn versionchecks_append_only() {
    let db = test_db().await;
    let check = NewVersionCheck {
        imei: "123456789012345".to_string(),
        custid: Some("ACME".to_string()),
        tid: Some("PM".to_string()),
        reported: Some("1.1.0".to_string()),
        upgrade_offered: true,
        offered_version: Some("1.2.0".to_string()),
    };
    db.insert_versioncheck(&check).await.unwrap();
    db.insert_versioncheck(&check).await.unwrap();

    let rows = db.versionchecks_for("123456789012345").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].upgrade_offered, 1);
    assert_eq!(rows[0].offered_version.as_deref(), Some("1.2.0"));
}

#[tokio::test]
async fn delivery_results_append_per_tid() {
    let db = test_db().await;
    db.insert_delivery_result("PM", "upgrade complete").await.unwrap();
    db.insert_delivery_result("PM", "rollback, install failed")
        .await
        .unwrap();
    db.insert_delivery_result("XX", "upgrade complete").await.unwrap();

    let rows = db.delivery_results_for("PM").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].result, "upgrade complete");

    assert_eq!(db.delivery_results_for("ZZ").await.unwrap().len(), 0);
}
