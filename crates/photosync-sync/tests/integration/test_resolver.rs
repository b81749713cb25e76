//! Album resolution: coalescing, cover photo, pagination and resumption

use std::sync::Arc;

use futures_util::future::join_all;
use photosync_core::domain::AlbumState;
use photosync_core::ports::GatewayError;
use photosync_sync::cache::EntityCache;
use photosync_sync::remote::RemoteApi;
use photosync_sync::resolver::AlbumResolver;
use photosync_sync::retry::RetryPolicy;
use photosync_sync::SyncError;

use crate::common::{test_config, FakeGateway};

async fn resolver_for(fake: &Arc<FakeGateway>, max_retries: u32, page_size: u32) -> AlbumResolver {
    let config = test_config(4, max_retries, page_size);
    let cache = EntityCache::new(
        RemoteApi::new(fake.clone()),
        RetryPolicy::from_config(&config.sync),
        &config.sync,
    );
    cache.seed().await.unwrap();
    AlbumResolver::new(Arc::new(cache))
}

#[tokio::test]
async fn test_concurrent_resolves_create_album_once() {
    let fake = FakeGateway::new();
    let cover = fake.add_photo("cover.jpg", &["api"]);
    let resolver = resolver_for(&fake, 2, 500).await;

    let handles = join_all((0..25).map(|_| resolver.resolve("New Album"))).await;
    let handles: Vec<_> = handles.into_iter().map(Result::unwrap).collect();

    assert_eq!(fake.calls("flickr.photosets.create"), 1);
    assert_eq!(fake.calls("flickr.photosets.getPhotos"), 1);
    assert_eq!(fake.calls("flickr.photos.search"), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));

    let album = handles[0].read().await;
    assert!(album.is_ready());
    assert_eq!(album.primary_photo_id().unwrap().as_str(), cover);
    assert!(album.contains_photo("cover.jpg"));

    let ids = fake.album_ids_named("New Album");
    assert_eq!(ids.len(), 1);
    assert_eq!(album.id().unwrap().as_str(), ids[0]);
}

#[tokio::test]
async fn test_ready_album_is_not_listed_again() {
    let fake = FakeGateway::new();
    fake.add_album("Trip", &["a.jpg", "b.jpg"]);
    let resolver = resolver_for(&fake, 2, 500).await;

    resolver.resolve("Trip").await.unwrap();
    resolver.resolve("Trip").await.unwrap();

    assert_eq!(fake.calls("flickr.photosets.getPhotos"), 1);
    assert_eq!(fake.calls("flickr.photosets.create"), 0);
}

#[tokio::test]
async fn test_pagination_collects_every_page() {
    let fake = FakeGateway::new();
    fake.add_album_of("Trip", 7);
    let resolver = resolver_for(&fake, 2, 3).await;

    let handle = resolver.resolve("Trip").await.unwrap();
    let album = handle.read().await;

    assert_eq!(fake.calls("flickr.photosets.getPhotos"), 3);
    assert_eq!(album.photos().len(), 7);
    assert_eq!(album.photo_count(), 7);
    assert!(album.completed_pages().is_empty());
}

#[tokio::test]
async fn test_failed_listing_resumes_missing_pages() {
    let fake = FakeGateway::new();
    fake.add_album_of("Trip", 7);
    let resolver = resolver_for(&fake, 0, 3).await;
    fake.fail_call(
        "flickr.photosets.getPhotos",
        2,
        GatewayError::Transport("connection reset".into()),
    );

    let err = resolver.resolve("Trip").await.unwrap_err();
    assert!(matches!(err, SyncError::RetriesExhausted { attempts: 1, .. }));
    {
        let handle = resolver.cache().album("Trip").unwrap();
        let album = handle.read().await;
        assert_eq!(album.state(), AlbumState::Unresolved);
        assert_eq!(album.completed_pages().len(), 1);
    }

    let handle = resolver.resolve("Trip").await.unwrap();
    // One good page, one failed page, then only the two missing pages.
    assert_eq!(fake.calls("flickr.photosets.getPhotos"), 4);
    assert_eq!(handle.read().await.photos().len(), 7);
}

#[tokio::test]
async fn test_cover_photo_falls_back_to_most_recent() {
    let fake = FakeGateway::new();
    fake.add_photo("old.jpg", &[]);
    let recent = fake.add_photo("recent.jpg", &[]);
    let resolver = resolver_for(&fake, 2, 500).await;

    resolver.resolve("First").await.unwrap();
    resolver.resolve("Second").await.unwrap();

    // Tagged search, then the untagged fallback; never repeated per album.
    assert_eq!(fake.calls("flickr.photos.search"), 2);
    assert_eq!(fake.calls("flickr.photosets.create"), 2);
    for name in ["First", "Second"] {
        let id = &fake.album_ids_named(name)[0];
        assert_eq!(fake.album_primary(id).unwrap(), recent);
    }
}

#[tokio::test]
async fn test_account_without_photos_cannot_create_albums() {
    let fake = FakeGateway::new();
    let resolver = resolver_for(&fake, 2, 500).await;

    let err = resolver.resolve("New").await.unwrap_err();
    assert!(matches!(err, SyncError::NoCoverPhoto));
    assert_eq!(fake.calls("flickr.photosets.create"), 0);
}

#[tokio::test]
async fn test_creation_failure_is_shared_and_not_retried() {
    let fake = FakeGateway::new();
    fake.add_photo("cover.jpg", &["api"]);
    let resolver = resolver_for(&fake, 3, 500).await;
    fake.fail_next(
        "flickr.photosets.create",
        1,
        GatewayError::Transport("timeout".into()),
    );

    let results = join_all((0..5).map(|_| resolver.resolve("New"))).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(SyncError::Gateway(GatewayError::Transport(_))))));
    assert_eq!(fake.calls("flickr.photosets.create"), 1);

    // A later, independent request gets the same error without a new create.
    let err = resolver.resolve("New").await.unwrap_err();
    assert!(matches!(err, SyncError::Gateway(GatewayError::Transport(_))));
    assert_eq!(fake.calls("flickr.photosets.create"), 1);
    assert!(fake.album_ids_named("New").is_empty());
}
