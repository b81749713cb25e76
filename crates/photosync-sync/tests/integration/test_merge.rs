//! Duplicate album cleanup

use photosync_core::ports::GatewayError;
use photosync_sync::SyncEngine;

use crate::common::{test_config, FakeGateway};

#[tokio::test]
async fn test_duplicates_merge_into_largest_album() {
    let fake = FakeGateway::new();
    let small = fake.add_album_of("Trip", 2);
    let large = fake.add_album_of("Trip", 5);
    let medium = fake.add_album_of("Trip", 3);
    let home = fake.add_album_of("Home", 1);
    let mut expected: Vec<String> = [&small, &large, &medium]
        .iter()
        .flat_map(|id| fake.album_photo_titles(id))
        .collect();
    expected.sort();

    let report = SyncEngine::new(fake.clone(), test_config(4, 2, 2))
        .cleanup(false)
        .await
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].name, "Trip");
    assert_eq!(report.groups[0].primary_id.as_str(), large);
    assert_eq!(report.albums_merged, 2);
    assert_eq!(report.photos_moved, 5);
    assert!(report.failures.is_empty());

    assert_eq!(fake.album_photo_titles(&large), expected);
    assert!(fake.album_photo_titles(&small).is_empty());
    assert!(fake.album_photo_titles(&medium).is_empty());
    assert_eq!(fake.album_photo_titles(&home).len(), 1);
    // Emptied albums stay in place.
    assert_eq!(fake.album_ids_named("Trip").len(), 3);
}

#[tokio::test]
async fn test_repeated_and_untitled_photos_are_all_moved() {
    let fake = FakeGateway::new();
    let repeated = fake.add_album("Trip", &["IMG_0001.JPG", "IMG_0001.JPG"]);
    let large = fake.add_album_of("Trip", 5);
    let untitled = fake.add_album("Trip", &["", "", ""]);
    let mut expected: Vec<String> = [&repeated, &large, &untitled]
        .iter()
        .flat_map(|id| fake.album_photo_ids(id))
        .collect();
    expected.sort();

    let report = SyncEngine::new(fake.clone(), test_config(4, 2, 2))
        .cleanup(false)
        .await
        .unwrap();

    assert_eq!(report.groups[0].primary_id.as_str(), large);
    assert_eq!(report.photos_moved, 5);
    assert_eq!(report.albums_merged, 2);
    assert!(report.failures.is_empty());
    assert_eq!(fake.album_photo_ids(&large), expected);
    assert_eq!(expected.len(), 10);
    assert!(fake.album_photo_ids(&repeated).is_empty());
    assert!(fake.album_photo_ids(&untitled).is_empty());
}

#[tokio::test]
async fn test_dry_run_reports_without_moving() {
    let fake = FakeGateway::new();
    let first = fake.add_album_of("Trip", 4);
    let second = fake.add_album_of("Trip", 4);

    let report = SyncEngine::new(fake.clone(), test_config(4, 2, 500))
        .cleanup(true)
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.groups.len(), 1);
    // First listed wins a tie.
    assert_eq!(report.groups[0].primary_id.as_str(), first);
    assert_eq!(report.groups[0].merged[0].id.as_str(), second);
    assert_eq!(report.groups[0].merged[0].photo_count, 4);
    assert_eq!(report.photos_moved, 0);
    assert_eq!(fake.calls("flickr.photosets.addPhoto"), 0);
    assert_eq!(fake.calls("flickr.photosets.getPhotos"), 0);
}

#[tokio::test]
async fn test_no_duplicates_is_a_no_op() {
    let fake = FakeGateway::new();
    fake.add_album_of("Trip", 2);
    fake.add_album_of("Home", 2);

    let report = SyncEngine::new(fake.clone(), test_config(4, 2, 500))
        .cleanup(false)
        .await
        .unwrap();

    assert!(report.groups.is_empty());
    assert_eq!(fake.calls("flickr.photosets.addPhoto"), 0);
}

#[tokio::test]
async fn test_failed_remove_is_reported_and_merge_continues() {
    let fake = FakeGateway::new();
    let primary = fake.add_album_of("Trip", 3);
    let other = fake.add_album_of("Trip", 2);
    fake.fail_call(
        "flickr.photosets.removePhoto",
        1,
        GatewayError::Api {
            code: 99,
            message: "Insufficient permissions".into(),
        },
    );

    let report = SyncEngine::new(fake.clone(), test_config(4, 2, 500))
        .cleanup(false)
        .await
        .unwrap();

    assert_eq!(report.photos_moved, 1);
    assert_eq!(report.albums_merged, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].album_id.as_str(), other);
    assert!(report.failures[0].photo_id.is_some());
    // The photo that failed to leave is in both albums, never in neither.
    assert_eq!(fake.album_photo_titles(&primary).len(), 5);
    assert_eq!(fake.album_photo_titles(&other).len(), 1);
    assert_eq!(fake.calls("flickr.photosets.removePhoto"), 2);
}
