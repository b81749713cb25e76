//! Typed calls over the remote gateway port
//!
//! [`RemoteApi`] knows the Flickr method names, their parameters and the
//! shape of their (normalized) responses. It makes exactly one gateway call
//! per method and never retries; callers wrap calls in
//! [`with_retry`](crate::retry::with_retry) where that is safe.
//!
//! Flickr is inconsistent about number encoding (`"photos": "184"` next to
//! `"videos": 0`), so every numeric or flag field is decoded leniently.

use std::sync::Arc;

use photosync_core::domain::{Album, AlbumId, Photo, PhotoId, Visibility};
use photosync_core::ports::{
    params, GatewayError, IRemoteGateway, Params, UploadContent, UPLOAD_METHOD,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Returned by `photosets.addPhoto` when the photo is already in the set
pub const PHOTO_ALREADY_IN_SET: i64 = 3;

/// Tag attached to every uploaded photo
pub const SYNC_TAG: &str = "flickr-sync";

/// Uploaded photos are hidden from public searches
const HIDDEN_FROM_SEARCH: &str = "2";

// ============================================================================
// Result types
// ============================================================================

/// One page of the album listing
#[derive(Debug, Clone)]
pub struct AlbumPage {
    pub albums: Vec<Album>,
    pub page: u32,
    pub pages: u32,
}

/// One page of an album's photos
#[derive(Debug, Clone)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub page: u32,
    pub pages: u32,
}

/// What `photos.getInfo` reports about a photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoInfo {
    pub id: PhotoId,
    pub title: String,
    pub visibility: Visibility,
}

/// The account the credentials belong to
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LoginInfo {
    pub id: String,
    pub username: String,
}

// ============================================================================
// RemoteApi
// ============================================================================

/// Typed facade over an [`IRemoteGateway`]
#[derive(Clone)]
pub struct RemoteApi {
    gateway: Arc<dyn IRemoteGateway>,
}

impl std::fmt::Debug for RemoteApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApi").finish_non_exhaustive()
    }
}

impl RemoteApi {
    pub fn new(gateway: Arc<dyn IRemoteGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn IRemoteGateway> {
        &self.gateway
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Params,
        upload: Option<UploadContent>,
    ) -> Result<T, GatewayError> {
        debug!(method, "Calling remote");
        let value = self.gateway.call(method, params, upload).await?;
        decode(method, value)
    }

    /// `flickr.photosets.getList`
    pub async fn list_albums_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<AlbumPage, GatewayError> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let raw: RawAlbumList = self
            .call(
                "flickr.photosets.getList",
                &params([("page", page_param.as_str()), ("per_page", per_page_param.as_str())]),
                None,
            )
            .await?;

        let mut albums = Vec::with_capacity(raw.photosets.photoset.len());
        for entry in raw.photosets.photoset {
            match entry.into_album() {
                Ok(album) => albums.push(album),
                Err(err) => warn!(error = %err, "Skipping malformed album entry"),
            }
        }
        Ok(AlbumPage {
            albums,
            page: raw.photosets.page.unwrap_or(page),
            pages: raw.photosets.pages.unwrap_or(1).max(1),
        })
    }

    /// `flickr.photosets.create`
    pub async fn create_album(
        &self,
        title: &str,
        description: &str,
        primary_photo_id: &PhotoId,
    ) -> Result<AlbumId, GatewayError> {
        let raw: RawCreated = self
            .call(
                "flickr.photosets.create",
                &params([
                    ("title", title),
                    ("description", description),
                    ("primary_photo_id", primary_photo_id.as_str()),
                ]),
                None,
            )
            .await?;
        AlbumId::new(raw.photoset.id).map_err(invalid)
    }

    /// `flickr.photosets.getPhotos`
    pub async fn list_album_photos(
        &self,
        album_id: &AlbumId,
        page: u32,
        per_page: u32,
    ) -> Result<PhotoPage, GatewayError> {
        let page_param = page.to_string();
        let per_page_param = per_page.to_string();
        let raw: RawAlbumPhotos = self
            .call(
                "flickr.photosets.getPhotos",
                &params([
                    ("photoset_id", album_id.as_str()),
                    ("page", page_param.as_str()),
                    ("per_page", per_page_param.as_str()),
                ]),
                None,
            )
            .await?;

        let mut photos = Vec::with_capacity(raw.photoset.photo.len());
        for entry in raw.photoset.photo {
            match PhotoId::new(entry.id) {
                Ok(id) => photos.push(
                    Photo::remote(
                        id,
                        entry.title,
                        Visibility {
                            is_public: entry.ispublic.is_set(),
                            is_friend: entry.isfriend.is_set(),
                            is_family: entry.isfamily.is_set(),
                        },
                    )
                    .with_primary(entry.isprimary.is_set()),
                ),
                Err(err) => warn!(album = %album_id, error = %err, "Skipping malformed photo entry"),
            }
        }
        Ok(PhotoPage {
            photos,
            page: raw.photoset.page.unwrap_or(page),
            pages: raw.photoset.pages.unwrap_or(1).max(1),
        })
    }

    /// Uploads a private photo titled `title`
    ///
    /// # Returns
    /// The id the service assigned to the new photo
    pub async fn upload_photo(
        &self,
        title: &str,
        description: &str,
        content: UploadContent,
    ) -> Result<PhotoId, GatewayError> {
        let raw: RawUploaded = self
            .call(
                UPLOAD_METHOD,
                &params([
                    ("title", title),
                    ("description", description),
                    ("tags", SYNC_TAG),
                    ("is_public", "0"),
                    ("is_friend", "0"),
                    ("is_family", "0"),
                    ("hidden", HIDDEN_FROM_SEARCH),
                ]),
                Some(content),
            )
            .await?;
        PhotoId::new(raw.photoid.content).map_err(invalid)
    }

    /// `flickr.photosets.addPhoto`; a photo already in the set counts as added
    pub async fn add_photo(
        &self,
        album_id: &AlbumId,
        photo_id: &PhotoId,
    ) -> Result<(), GatewayError> {
        let result = self
            .call::<Value>(
                "flickr.photosets.addPhoto",
                &params([("photoset_id", album_id.as_str()), ("photo_id", photo_id.as_str())]),
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if err.code() == Some(PHOTO_ALREADY_IN_SET) => {
                debug!(album = %album_id, photo = %photo_id, "Photo already in album");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// `flickr.photosets.removePhoto`
    pub async fn remove_photo(
        &self,
        album_id: &AlbumId,
        photo_id: &PhotoId,
    ) -> Result<(), GatewayError> {
        self.call::<Value>(
            "flickr.photosets.removePhoto",
            &params([("photoset_id", album_id.as_str()), ("photo_id", photo_id.as_str())]),
            None,
        )
        .await
        .map(|_| ())
    }

    /// `flickr.photos.getInfo`
    pub async fn photo_info(&self, photo_id: &PhotoId) -> Result<PhotoInfo, GatewayError> {
        let raw: RawPhotoInfo = self
            .call(
                "flickr.photos.getInfo",
                &params([("photo_id", photo_id.as_str())]),
                None,
            )
            .await?;
        let visibility = raw.photo.visibility.unwrap_or_default();
        Ok(PhotoInfo {
            id: PhotoId::new(raw.photo.id).map_err(invalid)?,
            title: raw.photo.title.content,
            visibility: Visibility {
                is_public: visibility.ispublic.is_set(),
                is_friend: visibility.isfriend.is_set(),
                is_family: visibility.isfamily.is_set(),
            },
        })
    }

    /// First photo of the authenticated user, optionally restricted to `tag`
    pub async fn search_photos(&self, tag: Option<&str>) -> Result<Option<PhotoId>, GatewayError> {
        let mut request = params([("user_id", "me"), ("per_page", "1")]);
        if let Some(tag) = tag {
            request.insert("tags".into(), tag.to_string());
        }
        let raw: RawSearch = self.call("flickr.photos.search", &request, None).await?;
        raw.photos
            .photo
            .into_iter()
            .next()
            .map(|entry| PhotoId::new(entry.id).map_err(invalid))
            .transpose()
    }

    /// `flickr.test.login`
    pub async fn test_login(&self) -> Result<LoginInfo, GatewayError> {
        let raw: RawLogin = self.call("flickr.test.login", &Params::new(), None).await?;
        Ok(LoginInfo {
            id: raw.user.id,
            username: raw.user.username.content,
        })
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value)
        .map_err(|err| GatewayError::InvalidResponse(format!("{method}: {err}")))
}

fn invalid(err: photosync_core::domain::DomainError) -> GatewayError {
    GatewayError::InvalidResponse(err.to_string())
}

// ============================================================================
// Wire shapes
// ============================================================================

/// A number that may arrive as a JSON number or a numeric string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Lenient(u64);

impl<'de> Deserialize<'de> for Lenient {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => Ok(Lenient(n.as_u64().unwrap_or(0))),
            Value::String(s) => Ok(Lenient(s.trim().parse().unwrap_or(0))),
            Value::Bool(b) => Ok(Lenient(u64::from(b))),
            _ => Ok(Lenient(0)),
        }
    }
}

impl Lenient {
    fn is_set(self) -> bool {
        self.0 != 0
    }
}

fn lenient_page<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Lenient>::deserialize(deserializer)?;
    Ok(value.and_then(|n| u32::try_from(n.0).ok()).filter(|n| *n > 0))
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(rename = "_content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawAlbumList {
    photosets: RawAlbumListBody,
}

#[derive(Debug, Deserialize)]
struct RawAlbumListBody {
    #[serde(default, deserialize_with = "lenient_page")]
    page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_page")]
    pages: Option<u32>,
    #[serde(default)]
    photoset: Vec<RawAlbum>,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    id: String,
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    photos: Lenient,
    #[serde(default)]
    videos: Lenient,
    #[serde(default)]
    title: Content,
    #[serde(default)]
    description: Content,
}

impl RawAlbum {
    fn into_album(self) -> Result<Album, photosync_core::domain::DomainError> {
        let id = AlbumId::new(self.id)?;
        let primary = self.primary.filter(|p| !p.is_empty()).map(PhotoId::new).transpose()?;
        Ok(Album::from_remote(
            id,
            self.title.content,
            self.description.content,
            primary,
            self.photos.0 + self.videos.0,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct RawCreated {
    photoset: RawCreatedBody,
}

#[derive(Debug, Deserialize)]
struct RawCreatedBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawAlbumPhotos {
    photoset: RawAlbumPhotosBody,
}

#[derive(Debug, Deserialize)]
struct RawAlbumPhotosBody {
    #[serde(default, deserialize_with = "lenient_page")]
    page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_page")]
    pages: Option<u32>,
    #[serde(default)]
    photo: Vec<RawListedPhoto>,
}

#[derive(Debug, Deserialize)]
struct RawListedPhoto {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    isprimary: Lenient,
    #[serde(default)]
    ispublic: Lenient,
    #[serde(default)]
    isfriend: Lenient,
    #[serde(default)]
    isfamily: Lenient,
}

#[derive(Debug, Deserialize)]
struct RawUploaded {
    photoid: RawUploadedId,
}

#[derive(Debug, Deserialize)]
struct RawUploadedId {
    #[serde(rename = "_content")]
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawPhotoInfo {
    photo: RawPhotoInfoBody,
}

#[derive(Debug, Deserialize)]
struct RawPhotoInfoBody {
    id: String,
    #[serde(default)]
    title: Content,
    #[serde(default)]
    visibility: Option<RawVisibility>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVisibility {
    #[serde(default)]
    ispublic: Lenient,
    #[serde(default)]
    isfriend: Lenient,
    #[serde(default)]
    isfamily: Lenient,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    photos: RawSearchBody,
}

#[derive(Debug, Deserialize)]
struct RawSearchBody {
    #[serde(default)]
    photo: Vec<RawSearchHit>,
}

#[derive(Debug, Deserialize)]
struct RawSearchHit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    username: Content,
}
