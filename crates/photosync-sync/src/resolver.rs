//! Album resolver
//!
//! "Give me a Ready album called `name`." Concurrent requests for the same
//! name are coalesced through a [`SingleFlight`] gate so that an album is
//! created at most once and listed at most once, however many files need
//! it at the same time.
//!
//! ## Resolution
//!
//! 1. Ready album in the cache: returned immediately
//! 2. Resolution already in flight: wait for its outcome
//! 3. Otherwise lead it: create the album remotely if it has no id (using
//!    the process-wide cover photo), then page through its photos
//!
//! Creation is never retried here. A failed create is remembered for the
//! rest of the run, and later requests for that name get the same error
//! without another create. A failed listing is not remembered: the next
//! request resumes it. If two runs race on the same new name the service
//! ends up with two albums; `cleanup` merges them afterwards.

use std::sync::Arc;

use dashmap::DashMap;
use photosync_core::domain::Album;
use tracing::{debug, info, warn};

use crate::cache::{AlbumHandle, EntityCache};
use crate::gate::SingleFlight;
use crate::SyncError;

pub struct AlbumResolver {
    cache: Arc<EntityCache>,
    gate: SingleFlight<String, AlbumHandle>,
    /// Albums whose remote creation failed, with the error
    failed_creations: DashMap<String, SyncError>,
}

impl AlbumResolver {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self {
            cache,
            gate: SingleFlight::new(),
            failed_creations: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Returns the Ready album called `name`, creating and listing it first
    /// if needed
    ///
    /// Every caller waiting on the same resolution gets the same outcome.
    /// After a failed listing the next call starts a new attempt, which
    /// resumes from whatever the failed one recorded (album id, listed
    /// pages). After a failed create every later call gets that error.
    pub async fn resolve(&self, name: &str) -> Result<AlbumHandle, SyncError> {
        self.check_creation(name)?;
        let handle = self.cache.get_or_create_album_placeholder(name)?;
        // A held write lock means a resolution is running: join it through
        // the gate rather than queueing on the lock.
        if handle.try_read().is_ok_and(|album| album.is_ready()) {
            return Ok(handle);
        }

        let (role, result) = self
            .gate
            .run(name.to_string(), || self.initialize(handle))
            .await;
        debug!(album = %name, ?role, ok = result.is_ok(), "Album resolution finished");
        result
    }

    async fn initialize(&self, handle: AlbumHandle) -> Result<AlbumHandle, SyncError> {
        {
            let mut album = handle.write().await;
            // A previous flight may have finished between the check and the gate.
            if !album.is_ready() {
                self.check_creation(album.name())?;
                if let Err(err) = self.bring_up(&mut album).await {
                    warn!(album = %album.name(), error = %err, "Album resolution failed");
                    album.abort();
                    return Err(err);
                }
            }
        }
        Ok(handle)
    }

    async fn bring_up(&self, album: &mut Album) -> Result<(), SyncError> {
        if album.id().is_none() {
            let cover = self.cache.cover_photo().await?;
            album.begin_creation(cover.clone())?;
            let id = match self
                .cache
                .remote()
                .create_album(album.name(), album.description(), &cover)
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    let err = SyncError::from(err);
                    warn!(
                        album = %album.name(),
                        error = %err,
                        "Album creation failed, not retrying this run"
                    );
                    self.failed_creations.insert(album.name().to_string(), err.clone());
                    return Err(err);
                }
            };
            info!(album = %album.name(), id = %id, "Created album");
            album.complete_creation(id)?;
        }
        self.cache.load_photos_for_album(album).await
    }

    fn check_creation(&self, name: &str) -> Result<(), SyncError> {
        match self.failed_creations.get(name) {
            Some(err) => Err(err.value().clone()),
            None => Ok(()),
        }
    }
}
