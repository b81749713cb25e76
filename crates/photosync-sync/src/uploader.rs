//! Upload coordinator
//!
//! [`UploadCoordinator::ensure`] guarantees that a remote photo named after
//! a local file exists in the album named after its directory, uploading
//! the file only when the album does not already hold that name.
//!
//! ## Ordering
//!
//! upload → add to album → fetch info → insert into the cached album.
//! A photo is recorded locally only once it exists remotely and belongs to
//! the album. A crash between upload and add leaves an unlinked remote
//! photo; the next run does not find the name in the album and uploads the
//! file again.
//!
//! Uploads are coalesced per (album, photo name), and presence is checked
//! again inside the gate, so two local files mapping to the same name are
//! never uploaded twice.

use std::sync::Arc;

use photosync_core::domain::{AlbumId, DomainError, LocalFileRef, Photo, PhotoId, Visibility};
use photosync_core::ports::UploadContent;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::AlbumHandle;
use crate::gate::{Role, SingleFlight};
use crate::resolver::AlbumResolver;
use crate::retry::{with_retry, RetryPolicy, RetryScope};
use crate::SyncError;

/// What `ensure` did for one local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The file was uploaded and added to its album
    Uploaded { photo_id: PhotoId, retries: u32 },
    /// The album already held a photo with this name
    AlreadyPresent,
}

pub struct UploadCoordinator {
    resolver: Arc<AlbumResolver>,
    retry: RetryPolicy,
    description: String,
    uploads: SingleFlight<(String, String), UploadOutcome>,
}

impl UploadCoordinator {
    pub fn new(resolver: Arc<AlbumResolver>, retry: RetryPolicy, description: impl Into<String>) -> Self {
        Self {
            resolver,
            retry,
            description: description.into(),
            uploads: SingleFlight::new(),
        }
    }

    pub fn resolver(&self) -> &Arc<AlbumResolver> {
        &self.resolver
    }

    /// Makes sure `file` exists remotely in its album
    ///
    /// Album resolution errors are returned as-is; remote failures during
    /// the upload sequence are retried per the retry policy; an unreadable
    /// file fails immediately.
    #[tracing::instrument(skip(self, file), fields(album = %file.album_name(), photo = %file.photo_name()))]
    pub async fn ensure(&self, file: &LocalFileRef) -> Result<UploadOutcome, SyncError> {
        let album = self.resolver.resolve(file.album_name()).await?;
        if album.read().await.contains_photo(file.photo_name()) {
            debug!("Already synced");
            return Ok(UploadOutcome::AlreadyPresent);
        }

        let key = (file.album_name().to_string(), file.photo_name().to_string());
        let (role, result) = self.uploads.run(key, || self.upload_into(&album, file)).await;
        match role {
            Role::Leader => result,
            // The leader uploaded this name on our behalf.
            Role::Follower => result.map(|_| UploadOutcome::AlreadyPresent),
        }
    }

    async fn upload_into(
        &self,
        album: &AlbumHandle,
        file: &LocalFileRef,
    ) -> Result<UploadOutcome, SyncError> {
        let album_id = {
            let album = album.read().await;
            if album.contains_photo(file.photo_name()) {
                return Ok(UploadOutcome::AlreadyPresent);
            }
            album.id().cloned().ok_or_else(|| DomainError::InvalidState {
                from: album.state().name().to_string(),
                to: "upload (album has no id)".to_string(),
            })?
        };

        let mut photo = Photo::pending(file.photo_name(), file.file_path());
        photo.start_upload()?;

        match self.transfer(&album_id, file).await {
            Ok((photo_id, visibility, retries)) => {
                photo.complete_upload(photo_id.clone())?;
                let photo = photo.with_visibility(visibility);
                let inserted = album.write().await.insert_photo_if_absent(photo)?;
                if !inserted {
                    warn!(photo_id = %photo_id, "Photo name appeared in album during upload");
                }
                info!(photo_id = %photo_id, retries, "Uploaded");
                Ok(UploadOutcome::Uploaded { photo_id, retries })
            }
            Err(err) => {
                if let Err(state_err) = photo.fail(err.to_string()) {
                    debug!(error = %state_err, "Cannot mark photo failed");
                }
                Err(err)
            }
        }
    }

    /// Runs the remote part of the sequence, each step retried on its own
    /// so that a failed link step never causes a second upload
    async fn transfer(
        &self,
        album_id: &AlbumId,
        file: &LocalFileRef,
    ) -> Result<(PhotoId, Visibility, u32), SyncError> {
        let data = tokio::fs::read(file.file_path())
            .await
            .map_err(|err| SyncError::LocalFile {
                path: file.file_path().to_path_buf(),
                message: err.to_string(),
            })?;
        let remote = self.resolver.cache().remote();

        let uploaded = with_retry(&self.retry, RetryScope::Remote, "upload", || {
            remote.upload_photo(
                file.photo_name(),
                &self.description,
                UploadContent::new(file.photo_name(), data.clone()),
            )
        })
        .await?;
        let photo_id = uploaded.value;
        debug!(photo_id = %photo_id, bytes = data.len(), "Upload accepted");
        drop(data);

        let linked = with_retry(&self.retry, RetryScope::Remote, "photosets.addPhoto", || {
            remote.add_photo(album_id, &photo_id)
        })
        .await?;

        let info = with_retry(&self.retry, RetryScope::Transient, "photos.getInfo", || {
            remote.photo_info(&photo_id)
        })
        .await?;

        let retries = uploaded.retries + linked.retries + info.retries;
        Ok((photo_id, info.value.visibility, retries))
    }
}
