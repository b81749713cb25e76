//! Entity cache
//!
//! Holds every [`Album`] the run knows about, keyed by name, and is the
//! single source of truth for what the remote service holds. Albums are
//! shared as [`AlbumHandle`]s so that every task observes the same state;
//! nothing outside the cache ever copies an album.
//!
//! The cache also owns the two listing operations (all albums, and all
//! photos of one album) and the per-process cover photo lookup.

use std::sync::Arc;

use dashmap::DashMap;
use photosync_core::config::SyncConfig;
use photosync_core::domain::{Album, AlbumState, DomainError, PhotoId};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::remote::RemoteApi;
use crate::retry::{with_retry, RetryPolicy, RetryScope};
use crate::SyncError;

/// Shared, mutable reference to a cached album
pub type AlbumHandle = Arc<RwLock<Album>>;

/// In-memory view of the remote albums and their photos
#[derive(Debug)]
pub struct EntityCache {
    remote: RemoteApi,
    retry: RetryPolicy,
    page_size: u32,
    description: String,
    cover_photo_tag: String,
    albums: DashMap<String, AlbumHandle>,
    cover_photo: OnceCell<PhotoId>,
}

impl EntityCache {
    pub fn new(remote: RemoteApi, retry: RetryPolicy, config: &SyncConfig) -> Self {
        Self {
            remote,
            retry,
            page_size: config.page_size.max(1),
            description: config.description.clone(),
            cover_photo_tag: config.cover_photo_tag.clone(),
            albums: DashMap::new(),
            cover_photo: OnceCell::new(),
        }
    }

    pub fn remote(&self) -> &RemoteApi {
        &self.remote
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Description given to albums this tool creates
    /// Items requested per listing page
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    pub fn album(&self, name: &str) -> Option<AlbumHandle> {
        self.albums.get(name).map(|entry| entry.value().clone())
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Returns the album called `name`, registering an unresolved
    /// placeholder if there is none
    ///
    /// Concurrent calls for the same name always get the same handle.
    pub fn get_or_create_album_placeholder(&self, name: &str) -> Result<AlbumHandle, SyncError> {
        if let Some(existing) = self.albums.get(name) {
            return Ok(existing.value().clone());
        }
        let placeholder = Album::new_unresolved(name, self.description.as_str())?;
        let handle = self
            .albums
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(placeholder)))
            .value()
            .clone();
        Ok(handle)
    }

    /// Registers a remote album unless one with the same name is cached
    ///
    /// Returns `true` if the album was added.
    pub fn register(&self, album: Album) -> bool {
        match self.albums.entry(album.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::new(RwLock::new(album)));
                true
            }
        }
    }

    /// Seeds the cache with the remote album listing
    ///
    /// When several remote albums share a name, the first one listed is
    /// used; `cleanup` merges the rest into one.
    #[tracing::instrument(skip(self))]
    pub async fn seed(&self) -> Result<usize, SyncError> {
        let albums = self.list_all_albums().await?;
        let total = albums.len();
        let mut registered = 0;
        for album in albums {
            let name = album.name().to_string();
            if self.register(album) {
                registered += 1;
            } else {
                warn!(album = %name, "Duplicate album name, run cleanup to merge");
            }
        }
        info!(total, registered, "Seeded album cache");
        Ok(registered)
    }

    // ------------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------------

    /// Pages through every remote album
    ///
    /// The albums are returned unresolved: their photos are not listed.
    pub async fn list_all_albums(&self) -> Result<Vec<Album>, SyncError> {
        let mut albums = Vec::new();
        let mut page = 1;
        loop {
            let fetched = with_retry(&self.retry, RetryScope::Transient, "photosets.getList", || {
                self.remote.list_albums_page(page, self.page_size)
            })
            .await?
            .value;
            debug!(page, pages = fetched.pages, count = fetched.albums.len(), "Listed albums");
            albums.extend(fetched.albums);
            if page >= fetched.pages {
                break;
            }
            page += 1;
        }
        Ok(albums)
    }

    /// Pages through the photos of `album` until every page reported by
    /// the service has been merged, then marks it Ready
    ///
    /// The page count is re-read from every response. Pages merged before
    /// a failure stay recorded on the album, so calling this again after an
    /// error only fetches the missing pages.
    pub async fn load_photos_for_album(&self, album: &mut Album) -> Result<(), SyncError> {
        let album_id = album.id().cloned().ok_or_else(|| DomainError::InvalidState {
            from: album.state().name().to_string(),
            to: "Listing (album has no id)".to_string(),
        })?;
        if album.state() == AlbumState::Unresolved {
            album.begin_listing()?;
        }

        while let Some(page) = album.next_page_to_fetch() {
            let fetched = with_retry(
                &self.retry,
                RetryScope::Transient,
                "photosets.getPhotos",
                || self.remote.list_album_photos(&album_id, page, self.page_size),
            )
            .await?
            .value;
            debug!(
                album = %album.name(),
                page,
                pages = fetched.pages,
                count = fetched.photos.len(),
                "Listed album photos"
            );
            album.record_page(page, fetched.pages, fetched.photos)?;
        }

        album.finish_listing()?;
        debug!(album = %album.name(), photos = album.photo_count(), "Album photos loaded");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Cover photo
    // ------------------------------------------------------------------------

    /// Photo used as the required cover of every album this run creates
    ///
    /// Looked up once per process: the first photo tagged with the
    /// configured tag, or else the most recent photo. A failed lookup is
    /// not cached.
    pub async fn cover_photo(&self) -> Result<PhotoId, SyncError> {
        self.cover_photo
            .get_or_try_init(|| self.find_cover_photo())
            .await
            .cloned()
    }

    async fn find_cover_photo(&self) -> Result<PhotoId, SyncError> {
        let tag = self.cover_photo_tag.as_str();
        let tagged = with_retry(&self.retry, RetryScope::Transient, "photos.search", || {
            self.remote.search_photos(Some(tag))
        })
        .await?
        .value;
        if let Some(id) = tagged {
            info!(photo = %id, tag, "Using tagged cover photo for new albums");
            return Ok(id);
        }

        let recent = with_retry(&self.retry, RetryScope::Transient, "photos.search", || {
            self.remote.search_photos(None)
        })
        .await?
        .value;
        match recent {
            Some(id) => {
                info!(photo = %id, tag, "No tagged photo, using most recent photo as cover");
                Ok(id)
            }
            None => Err(SyncError::NoCoverPhoto),
        }
    }
}
