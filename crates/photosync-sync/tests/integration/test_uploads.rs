//! Upload coordination: deduplication, retries and local failures

use std::sync::Arc;

use photosync_core::domain::LocalFileRef;
use photosync_core::ports::GatewayError;
use photosync_sync::cache::EntityCache;
use photosync_sync::remote::RemoteApi;
use photosync_sync::resolver::AlbumResolver;
use photosync_sync::retry::RetryPolicy;
use photosync_sync::uploader::{UploadCoordinator, UploadOutcome};
use photosync_sync::SyncError;
use tempfile::TempDir;

use crate::common::{test_config, write_media, FakeGateway};

async fn coordinator_for(fake: &Arc<FakeGateway>, max_retries: u32) -> UploadCoordinator {
    let config = test_config(4, max_retries, 500);
    let retry = RetryPolicy::from_config(&config.sync);
    let cache = EntityCache::new(RemoteApi::new(fake.clone()), retry, &config.sync);
    cache.seed().await.unwrap();
    let resolver = Arc::new(AlbumResolver::new(Arc::new(cache)));
    UploadCoordinator::new(resolver, retry, config.sync.description.clone())
}

fn local_file(root: &TempDir, album: &str, photo: &str) -> LocalFileRef {
    let path = root.path().join(album).join(photo);
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    LocalFileRef::from_path(path, size).unwrap()
}

#[tokio::test]
async fn test_same_name_is_uploaded_once() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let coordinator = coordinator_for(&fake, 2).await;
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "beach.jpg")]);
    let file = local_file(&dir, "Trip", "beach.jpg");

    let (a, b) = tokio::join!(coordinator.ensure(&file), coordinator.ensure(&file));
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, UploadOutcome::AlreadyPresent));

    assert!(matches!(outcomes[0], UploadOutcome::Uploaded { retries: 0, .. }));
    assert_eq!(outcomes[1], UploadOutcome::AlreadyPresent);
    assert_eq!(fake.calls("upload"), 1);
    assert_eq!(fake.calls("flickr.photosets.addPhoto"), 1);
}

#[tokio::test]
async fn test_photo_already_in_album_is_skipped() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["beach.jpg"]);
    let coordinator = coordinator_for(&fake, 2).await;
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "beach.jpg")]);

    let outcome = coordinator
        .ensure(&local_file(&dir, "Trip", "beach.jpg"))
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::AlreadyPresent);
    assert_eq!(fake.calls("upload"), 0);
}

#[tokio::test]
async fn test_transient_upload_errors_are_retried() {
    let fake = FakeGateway::new();
    let album_id = fake.add_album("Trip", &["old.jpg"]);
    let coordinator = coordinator_for(&fake, 3).await;
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "beach.jpg")]);
    fake.fail_next("upload", 2, GatewayError::Transport("connection reset".into()));

    let outcome = coordinator
        .ensure(&local_file(&dir, "Trip", "beach.jpg"))
        .await
        .unwrap();

    assert!(matches!(outcome, UploadOutcome::Uploaded { retries: 2, .. }));
    assert_eq!(fake.calls("upload"), 3);
    assert_eq!(fake.album_photo_titles(&album_id), vec!["beach.jpg", "old.jpg"]);
}

#[tokio::test]
async fn test_failed_link_does_not_upload_again() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let coordinator = coordinator_for(&fake, 3).await;
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "beach.jpg")]);
    fake.fail_next(
        "flickr.photosets.addPhoto",
        1,
        GatewayError::Api {
            code: 105,
            message: "Service currently unavailable".into(),
        },
    );

    let outcome = coordinator
        .ensure(&local_file(&dir, "Trip", "beach.jpg"))
        .await
        .unwrap();

    assert!(matches!(outcome, UploadOutcome::Uploaded { retries: 1, .. }));
    assert_eq!(fake.calls("upload"), 1);
    assert_eq!(fake.calls("flickr.photosets.addPhoto"), 2);
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let coordinator = coordinator_for(&fake, 3).await;
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "beach.jpg")]);
    fake.fail_next(
        "upload",
        1,
        GatewayError::Api {
            code: 98,
            message: "Invalid auth token".into(),
        },
    );

    let err = coordinator
        .ensure(&local_file(&dir, "Trip", "beach.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Gateway(GatewayError::Api { code: 98, .. })));
    assert_eq!(fake.calls("upload"), 1);
}

#[tokio::test]
async fn test_missing_local_file_fails_without_upload() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let coordinator = coordinator_for(&fake, 3).await;
    let dir = TempDir::new().unwrap();
    let file = LocalFileRef::new("Trip", "gone.jpg", dir.path().join("Trip/gone.jpg"), 10);

    let err = coordinator.ensure(&file).await.unwrap_err();

    assert!(matches!(err, SyncError::LocalFile { .. }));
    assert_eq!(err.retries(), 0);
    assert_eq!(fake.calls("upload"), 0);
}

#[tokio::test]
async fn test_uploaded_photo_is_recorded_in_album() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["old.jpg"]);
    let coordinator = coordinator_for(&fake, 2).await;
    let dir = TempDir::new().unwrap();
    write_media(dir.path(), &[("Trip", "beach.jpg")]);

    let outcome = coordinator
        .ensure(&local_file(&dir, "Trip", "beach.jpg"))
        .await
        .unwrap();
    let UploadOutcome::Uploaded { photo_id, .. } = outcome else {
        panic!("expected an upload, got {outcome:?}");
    };

    let handle = coordinator.resolver().cache().album("Trip").unwrap();
    let album = handle.read().await;
    let photo = album.find_photo("beach.jpg").unwrap();
    assert_eq!(photo.id(), Some(&photo_id));
    assert_eq!(album.photo_count(), 2);

    // A second pass finds it in the cache without touching the network.
    let before = fake.total_calls();
    drop(album);
    let again = coordinator
        .ensure(&local_file(&dir, "Trip", "beach.jpg"))
        .await
        .unwrap();
    assert_eq!(again, UploadOutcome::AlreadyPresent);
    assert_eq!(fake.total_calls(), before);
}
