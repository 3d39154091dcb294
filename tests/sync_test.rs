//! # Index Sync Tests
//!
//! These tests run the sync engine against an in-memory object store and a
//! temporary SQLite index.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test sync_test
//! ```

mod common;

use chrono::{Local, NaiveDate};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::Duration;

use call_archive::config::SyncSettings;
use call_archive::error::ArchiveError;
use call_archive::filename::date_folder;
use call_archive::index::MetadataIndex;
use call_archive::query::FileQuery;
use call_archive::store::RecordingStore;
use call_archive::sync::{SyncEngine, SyncOutcome};
use common::FaultyStore;

struct TestHarness {
    engine: Arc<SyncEngine>,
    index: Arc<MetadataIndex>,
    objects: Arc<InMemory>,
    _guard: tempfile::TempDir,
}

fn settings(batch_size: usize) -> SyncSettings {
    SyncSettings {
        periodic: false,
        interval_secs: 300,
        batch_size,
        batch_pause_ms: 0,
    }
}

async fn create_harness(batch_size: usize) -> TestHarness {
    let (pool, guard) = call_archive::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    let index = Arc::new(
        MetadataIndex::from_pool(pool, guard.path().join("test.sqlite"))
            .await
            .unwrap(),
    );
    let objects = Arc::new(InMemory::new());
    let store = Arc::new(RecordingStore::new(objects.clone(), "recordings", "cache"));
    let engine = Arc::new(SyncEngine::new(index.clone(), store, settings(batch_size)));
    TestHarness {
        engine,
        index,
        objects,
        _guard: guard,
    }
}

/// Harness whose store can be told to fail listings
async fn create_faulty_harness() -> (TestHarness, Arc<FaultyStore>) {
    let (pool, guard) = call_archive::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    let index = Arc::new(
        MetadataIndex::from_pool(pool, guard.path().join("test.sqlite"))
            .await
            .unwrap(),
    );
    let objects = Arc::new(InMemory::new());
    let faulty = Arc::new(FaultyStore::new(objects.clone()));
    let store = Arc::new(RecordingStore::new(faulty.clone(), "recordings", "cache"));
    let engine = Arc::new(SyncEngine::new(index.clone(), store, settings(1000)));
    let harness = TestHarness {
        engine,
        index,
        objects,
        _guard: guard,
    };
    (harness, faulty)
}

async fn put(objects: &InMemory, key: &str, data: &'static [u8]) {
    objects
        .put(&ObjectPath::from(key), PutPayload::from_static(data))
        .await
        .unwrap();
}

async fn seed_days(objects: &InMemory) {
    put(objects, "recordings/9_25_2025/2012055255 by a@x.com @ 9_47_43 AM_18600.wav", b"RIFF1").await;
    put(objects, "recordings/9_26_2025/2015550100 by b@x.com @ 1_05_00 PM_30000.wav", b"RIFF22").await;
    put(objects, "recordings/9_26_2025/unknown.wav", b"RIFF").await;
    put(objects, "recordings/9_26_2025/readme.txt", b"not audio").await;
    put(objects, "recordings/9_27_2025/3475550199 by c@x.com @ 11_59_59 PM_45000.wav", b"RIFF").await;
    put(objects, "recordings/2025-09-26/misfiled.wav", b"RIFF").await;
    put(objects, "cache/audio/abc.wav", b"RIFF").await;
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

#[tokio::test]
async fn test_date_range_sync_indexes_only_requested_days() {
    let harness = create_harness(1000).await;
    seed_days(&harness.objects).await;

    let report = harness
        .engine
        .sync_date_range(date(9, 26), date(9, 26))
        .await
        .unwrap();
    assert_eq!(report.indexed_count, 2);
    assert!(report.failed_days.is_empty());

    assert!(harness.index.exists("9_26_2025/unknown.wav").await.unwrap());
    assert!(!harness
        .index
        .exists("9_25_2025/2012055255 by a@x.com @ 9_47_43 AM_18600.wav")
        .await
        .unwrap());

    let stored = harness
        .index
        .get("9_26_2025/2015550100 by b@x.com @ 1_05_00 PM_30000.wav")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.file_size, 6);
    assert_eq!(stored.duration_ms, 30000);
}

#[tokio::test]
async fn test_multi_day_range_and_empty_days() {
    let harness = create_harness(1000).await;
    seed_days(&harness.objects).await;

    let report = harness
        .engine
        .sync_date_range(date(9, 24), date(9, 28))
        .await
        .unwrap();
    assert_eq!(report.indexed_count, 4);
    assert!(report.failed_days.is_empty());
}

#[tokio::test]
async fn test_failed_day_does_not_stop_remaining_days() {
    let (harness, faulty) = create_faulty_harness().await;
    seed_days(&harness.objects).await;
    faulty.fail_list_under("recordings/9_26_2025");

    let report = harness
        .engine
        .sync_date_range(date(9, 25), date(9, 27))
        .await
        .unwrap();
    assert_eq!(report.failed_days, vec!["9_26_2025".to_string()]);
    assert_eq!(report.indexed_count, 2);

    assert!(harness
        .index
        .exists("9_25_2025/2012055255 by a@x.com @ 9_47_43 AM_18600.wav")
        .await
        .unwrap());
    assert!(harness
        .index
        .exists("9_27_2025/3475550199 by c@x.com @ 11_59_59 PM_45000.wav")
        .await
        .unwrap());
    assert!(!harness.index.exists("9_26_2025/unknown.wav").await.unwrap());
}

#[tokio::test]
async fn test_full_sync_listing_failure_is_an_error() {
    let (harness, faulty) = create_faulty_harness().await;
    seed_days(&harness.objects).await;
    faulty.fail_list_under("recordings");

    let err = harness.engine.sync_all().await.unwrap_err();
    assert!(matches!(err, ArchiveError::Listing { ref prefix, .. } if prefix == "recordings"));
    assert_eq!(err.stage(), "listing");

    let page = harness.index.query(&FileQuery::default()).await.unwrap();
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let harness = create_harness(1000).await;
    let err = harness
        .engine
        .sync_date_range(date(9, 27), date(9, 26))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_full_sync_in_batches_is_idempotent() {
    let harness = create_harness(2).await;
    seed_days(&harness.objects).await;

    let report = harness.engine.sync_all().await.unwrap();
    // misfiled.wav is listed but cannot be parsed
    assert_eq!(report.indexed_count, 4);

    let again = harness.engine.sync_all().await.unwrap();
    assert_eq!(again.indexed_count, 4);

    let page = harness.index.query(&FileQuery::default()).await.unwrap();
    assert_eq!(page.total_count, 4);
}

#[tokio::test]
async fn test_current_day_sync_uses_local_date() {
    let harness = create_harness(1000).await;
    let today = date_folder(Local::now().date_naive());
    put(&harness.objects, &format!("recordings/{}/today.wav", today), b"RIFF").await;

    let report = harness.engine.sync_current_day().await.unwrap();
    assert_eq!(report.indexed_count, 1);
    assert!(harness
        .index
        .exists(&format!("{}/today.wav", today))
        .await
        .unwrap());

    match harness.engine.try_sync_current_day().await {
        SyncOutcome::Completed(report) => assert_eq!(report.indexed_count, 1),
        SyncOutcome::Skipped => panic!("no other sync was running"),
    }
}

#[tokio::test]
async fn test_periodic_sync_indexes_new_files() {
    let harness = create_harness(1000).await;
    let today = date_folder(Local::now().date_naive());
    put(&harness.objects, &format!("recordings/{}/first.wav", today), b"RIFF").await;

    let handle = harness
        .engine
        .clone()
        .spawn_periodic_sync(Duration::from_millis(50));

    let path = format!("{}/first.wav", today);
    let mut indexed = false;
    for _ in 0..40 {
        if harness.index.exists(&path).await.unwrap() {
            indexed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    handle.abort();
    assert!(indexed, "periodic sync should index today's folder");
}
