//! End-to-end sync runs through discovery and the bounded work queue

use std::time::Duration;

use photosync_core::ports::GatewayError;
use photosync_sync::{SyncEngine, SyncError};
use tempfile::TempDir;

use crate::common::{test_config, write_media, FakeGateway};

#[tokio::test]
async fn test_workers_bound_concurrent_calls() {
    let fake = FakeGateway::with_latency(Duration::from_millis(5));
    fake.add_photo("cover.jpg", &["api"]);
    let dir = TempDir::new().unwrap();
    let files: Vec<(String, String)> = (0..24)
        .map(|i| (format!("Album {}", i % 3), format!("photo-{i:02}.jpg")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(a, p)| (a.as_str(), p.as_str())).collect();
    write_media(dir.path(), &refs);

    let engine = SyncEngine::new(fake.clone(), test_config(4, 2, 500));
    let report = engine.sync(dir.path()).await.unwrap();

    assert_eq!(report.discovered, 24);
    assert_eq!(report.uploaded, 24);
    assert_eq!(report.failed, 0);
    assert!(report.is_complete());
    assert!(fake.max_in_flight() <= 4, "max in flight: {}", fake.max_in_flight());
    assert_eq!(fake.calls("upload"), 24);
    assert_eq!(fake.calls("flickr.photosets.create"), 3);
}

#[tokio::test]
async fn test_second_run_uploads_nothing() {
    let fake = FakeGateway::new();
    fake.add_photo("cover.jpg", &["api"]);
    let dir = TempDir::new().unwrap();
    write_media(
        dir.path(),
        &[
            ("Trip", "a.jpg"),
            ("Trip", "b.png"),
            ("Home", "c.mov"),
            ("Home", "notes.txt"),
            ("Home", ".hidden.jpg"),
        ],
    );

    let first = SyncEngine::new(fake.clone(), test_config(3, 2, 500))
        .sync(dir.path())
        .await
        .unwrap();
    assert_eq!(first.discovered, 3);
    assert_eq!(first.uploaded, 3);

    let second = SyncEngine::new(fake.clone(), test_config(3, 2, 500))
        .sync(dir.path())
        .await
        .unwrap();
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.already_present, 3);
    assert_eq!(fake.calls("upload"), 3);
    assert_eq!(fake.album_ids_named("Trip").len(), 1);
    assert_eq!(fake.album_ids_named("Home").len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_fail_one_file_and_drain() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "a.jpg"), ("Trip", "b.jpg")]);
    fake.fail_next("upload", 3, GatewayError::Transport("connection reset".into()));

    let engine = SyncEngine::new(fake.clone(), test_config(1, 2, 500));
    let report = engine.sync(dir.path()).await.unwrap();

    assert_eq!(report.discovered, 2);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retries, 2);
    assert!(!report.is_complete());
    assert_eq!(report.failures[0].photo, "a.jpg");
    assert_eq!(fake.calls("upload"), 4);
}

#[tokio::test]
async fn test_failed_album_creation_fails_its_files_once() {
    let fake = FakeGateway::new();
    fake.add_photo("cover.jpg", &["api"]);
    let dir = TempDir::new().unwrap();
    let files: Vec<String> = (0..20).map(|i| format!("photo-{i:02}.jpg")).collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|p| ("New", p.as_str())).collect();
    write_media(dir.path(), &refs);
    fake.fail_next(
        "flickr.photosets.create",
        1,
        GatewayError::Transport("timeout".into()),
    );

    let report = SyncEngine::new(fake.clone(), test_config(2, 2, 500))
        .sync(dir.path())
        .await
        .unwrap();

    assert_eq!(report.discovered, 20);
    assert_eq!(report.failed, 20);
    assert_eq!(report.uploaded, 0);
    assert_eq!(fake.calls("flickr.photosets.create"), 1);
    assert_eq!(fake.calls("upload"), 0);
    assert!(fake.album_ids_named("New").is_empty());
}

#[tokio::test]
async fn test_rate_limit_waits_and_succeeds() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "a.jpg")]);
    fake.fail_next(
        "upload",
        1,
        GatewayError::RateLimited {
            retry_after: Some(Duration::from_millis(10)),
        },
    );

    let report = SyncEngine::new(fake.clone(), test_config(2, 2, 500))
        .sync(dir.path())
        .await
        .unwrap();

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.retries, 1);
}

#[tokio::test]
async fn test_missing_directory_is_fatal_before_any_call() {
    let fake = FakeGateway::new();
    let dir = TempDir::new().unwrap();

    let err = SyncEngine::new(fake.clone(), test_config(2, 2, 500))
        .sync(&dir.path().join("missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Setup(_)));
    assert!(err.is_fatal());
    assert_eq!(fake.total_calls(), 0);
}

#[tokio::test]
async fn test_failed_album_listing_is_fatal() {
    let fake = FakeGateway::new();
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "a.jpg")]);
    fake.fail_next(
        "flickr.photosets.getList",
        1,
        GatewayError::Api {
            code: 98,
            message: "Invalid auth token".into(),
        },
    );

    let err = SyncEngine::new(fake.clone(), test_config(2, 2, 500))
        .sync(dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Gateway(GatewayError::Api { code: 98, .. })));
    assert_eq!(fake.calls("upload"), 0);
}
