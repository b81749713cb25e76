//! Duplicate album merger
//!
//! Concurrent or interrupted runs can leave several remote albums with the
//! same name. The merger groups the remote albums by name and, for each
//! group, moves every photo of the smaller albums into the largest one (the
//! *primary*; the first listed wins a tie).
//!
//! Each photo is added to the primary before it is removed from its old
//! album, one photo at a time per album, so a photo is never left in no
//! album at all. Different albums of one group drain concurrently.
//!
//! Emptied albums are left in place; deleting them is up to the user.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use photosync_core::domain::{Album, AlbumId, PhotoId};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::EntityCache;
use crate::retry::{with_retry, RetryScope};
use crate::SyncError;

// ============================================================================
// MergeReport
// ============================================================================

/// A non-primary album of a duplicate group
#[derive(Debug, Clone, Serialize)]
pub struct MergedAlbum {
    pub id: AlbumId,
    /// Photo count reported by the album listing
    pub photo_count: u64,
    pub photos_moved: u64,
}

/// Albums sharing one name
#[derive(Debug, Clone, Serialize)]
pub struct MergeGroup {
    pub name: String,
    pub primary_id: AlbumId,
    pub primary_photo_count: u64,
    pub merged: Vec<MergedAlbum>,
}

/// A photo or album the merger could not move
#[derive(Debug, Clone, Serialize)]
pub struct MergeFailure {
    pub album: String,
    pub album_id: AlbumId,
    pub photo_id: Option<PhotoId>,
    pub error: String,
}

/// Summary of a cleanup run
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub dry_run: bool,
    pub groups: Vec<MergeGroup>,
    /// Non-primary albums drained without a failure
    pub albums_merged: u64,
    pub photos_moved: u64,
    pub failures: Vec<MergeFailure>,
    pub duration_ms: u64,
}

// ============================================================================
// AlbumMerger
// ============================================================================

pub struct AlbumMerger {
    cache: Arc<EntityCache>,
}

impl AlbumMerger {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self { cache }
    }

    /// Merges every group of same-named albums into its primary
    ///
    /// With `dry_run` the groups and their primaries are reported without
    /// moving anything.
    ///
    /// # Errors
    /// Only a failed album listing; per-photo failures go to the report.
    #[tracing::instrument(skip(self))]
    pub async fn merge_duplicates(&self, dry_run: bool) -> Result<MergeReport, SyncError> {
        let started = Instant::now();
        let albums = self.cache.list_all_albums().await?;
        let groups = group_duplicates(albums);
        info!(groups = groups.len(), "Found duplicate album groups");

        let mut report = MergeReport {
            dry_run,
            ..Default::default()
        };

        for (name, mut albums) in groups {
            let primary = albums.remove(pick_primary(&albums));
            let Some(primary_id) = primary.id().cloned() else {
                continue;
            };
            info!(
                album = %name,
                primary = %primary_id,
                photos = primary.photo_count(),
                others = albums.len(),
                "Merging duplicate albums"
            );

            let merged = if dry_run {
                albums
                    .iter()
                    .filter_map(|album| {
                        Some(MergedAlbum {
                            id: album.id()?.clone(),
                            photo_count: album.photo_count(),
                            photos_moved: 0,
                        })
                    })
                    .collect()
            } else {
                let drains = albums.into_iter().filter_map(|album| {
                    let album_id = album.id()?.clone();
                    Some(self.drain_into(&primary_id, album_id, album))
                });
                let mut merged = Vec::new();
                for (album, failures) in join_all(drains).await {
                    if failures.is_empty() {
                        report.albums_merged += 1;
                    }
                    report.photos_moved += album.photos_moved;
                    report.failures.extend(failures);
                    merged.push(album);
                }
                merged
            };

            report.groups.push(MergeGroup {
                name,
                primary_id,
                primary_photo_count: primary.photo_count(),
                merged,
            });
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            groups = report.groups.len(),
            albums_merged = report.albums_merged,
            photos_moved = report.photos_moved,
            failures = report.failures.len(),
            dry_run,
            "Cleanup finished"
        );
        Ok(report)
    }

    /// Moves every photo of `album` into `primary_id`, one at a time
    async fn drain_into(
        &self,
        primary_id: &AlbumId,
        album_id: AlbumId,
        album: Album,
    ) -> (MergedAlbum, Vec<MergeFailure>) {
        let mut failures = Vec::new();
        let mut merged = MergedAlbum {
            id: album_id.clone(),
            photo_count: album.photo_count(),
            photos_moved: 0,
        };

        let photo_ids = match self.list_photo_ids(&album_id).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(album = %album.name(), id = %album_id, error = %err, "Cannot list album photos");
                failures.push(MergeFailure {
                    album: album.name().to_string(),
                    album_id,
                    photo_id: None,
                    error: err.to_string(),
                });
                return (merged, failures);
            }
        };

        for photo_id in photo_ids {
            match self.move_photo(primary_id, &album_id, &photo_id).await {
                Ok(()) => merged.photos_moved += 1,
                Err(err) => {
                    warn!(
                        album = %album.name(),
                        photo_id = %photo_id,
                        error = %err,
                        "Failed to move photo"
                    );
                    failures.push(MergeFailure {
                        album: album.name().to_string(),
                        album_id: album_id.clone(),
                        photo_id: Some(photo_id),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            album = %album.name(),
            id = %album_id,
            moved = merged.photos_moved,
            "Album drained into primary"
        );
        (merged, failures)
    }

    /// Every photo id in the album, in listing order
    ///
    /// Titles are not unique within an album, so the listing is collected
    /// by id rather than through the name-keyed cache. The page count is
    /// re-read from every response; an id seen twice is kept once.
    async fn list_photo_ids(&self, album_id: &AlbumId) -> Result<Vec<PhotoId>, SyncError> {
        let remote = self.cache.remote();
        let per_page = self.cache.page_size();
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let fetched = with_retry(
                self.cache.retry_policy(),
                RetryScope::Transient,
                "photosets.getPhotos",
                || remote.list_album_photos(album_id, page, per_page),
            )
            .await?
            .value;
            for photo in fetched.photos {
                if let Some(id) = photo.id() {
                    if seen.insert(id.clone()) {
                        ids.push(id.clone());
                    }
                }
            }
            if page >= fetched.pages {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }

    async fn move_photo(
        &self,
        to: &AlbumId,
        from: &AlbumId,
        photo_id: &PhotoId,
    ) -> Result<(), SyncError> {
        let remote = self.cache.remote();
        let policy = self.cache.retry_policy();
        with_retry(policy, RetryScope::Remote, "photosets.addPhoto", || {
            remote.add_photo(to, photo_id)
        })
        .await?;
        with_retry(policy, RetryScope::Remote, "photosets.removePhoto", || {
            remote.remove_photo(from, photo_id)
        })
        .await?;
        Ok(())
    }
}

/// Groups albums by name, keeping first-listed order, and returns the
/// groups with more than one album
fn group_duplicates(albums: Vec<Album>) -> Vec<(String, Vec<Album>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Album>)> = Vec::new();
    for album in albums.into_iter().filter(|album| album.id().is_some()) {
        match index.get(album.name()) {
            Some(&i) => groups[i].1.push(album),
            None => {
                index.insert(album.name().to_string(), groups.len());
                groups.push((album.name().to_string(), vec![album]));
            }
        }
    }
    groups.retain(|(_, albums)| albums.len() > 1);
    groups
}

/// Index of the album with the most photos; the first one wins a tie
fn pick_primary(albums: &[Album]) -> usize {
    let mut best = 0;
    for (i, album) in albums.iter().enumerate().skip(1) {
        if album.photo_count() > albums[best].photo_count() {
            best = i;
        }
    }
    best
}
