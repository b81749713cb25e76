//! In-memory stand-in for the Flickr API
//!
//! Simulates albums, photos, pagination, the cover photo search and
//! upload, records call counts and the highest number of concurrent calls,
//! and can fail chosen calls.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use photosync_core::config::{Config, ConfigBuilder};
use photosync_core::ports::{GatewayError, IRemoteGateway, Params, UploadContent, UPLOAD_METHOD};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct FakeAlbum {
    id: String,
    title: String,
    description: String,
    primary: String,
    photos: Vec<String>,
}

#[derive(Debug, Clone)]
struct FakePhoto {
    title: String,
    tags: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    albums: Vec<FakeAlbum>,
    photos: BTreeMap<u64, FakePhoto>,
    calls: HashMap<String, usize>,
    /// method -> (1-based call number -> error)
    failures: HashMap<String, HashMap<usize, GatewayError>>,
}

impl FakeState {
    fn new_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn album_mut(&mut self, id: &str) -> Result<&mut FakeAlbum, GatewayError> {
        self.albums
            .iter_mut()
            .find(|album| album.id == id)
            .ok_or_else(|| api_error(1, "Photoset not found"))
    }
}

pub struct FakeGateway {
    state: Mutex<FakeState>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Self::with_latency(Duration::from_millis(1))
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            latency,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Adds a photo outside any album and returns its id
    pub fn add_photo(&self, title: &str, tags: &[&str]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id();
        state.photos.insert(
            id,
            FakePhoto {
                title: title.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
        id.to_string()
    }

    /// Adds an album holding new photos with the given titles
    pub fn add_album(&self, title: &str, photo_titles: &[&str]) -> String {
        let photo_ids: Vec<String> = photo_titles.iter().map(|t| self.add_photo(t, &[])).collect();
        let mut state = self.state.lock().unwrap();
        let id = format!("72{}", state.new_id());
        state.albums.push(FakeAlbum {
            id: id.clone(),
            title: title.to_string(),
            description: String::new(),
            primary: photo_ids.first().cloned().unwrap_or_default(),
            photos: photo_ids,
        });
        id
    }

    /// Adds an album of `count` photos with titles unique to this album
    pub fn add_album_of(&self, title: &str, count: usize) -> String {
        let prefix = self.state.lock().unwrap().next_id + 1;
        let titles: Vec<String> = (0..count).map(|i| format!("{title}-{prefix}-{i}.jpg")).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        self.add_album(title, &refs)
    }

    /// Makes the `nth` (1-based, counted from the start) call of `method` fail
    pub fn fail_call(&self, method: &str, nth: usize, error: GatewayError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(method.to_string())
            .or_default()
            .insert(nth, error);
    }

    /// Makes the next `count` calls of `method` fail with `error`
    pub fn fail_next(&self, method: &str, count: usize, error: GatewayError) {
        let done = self.calls(method);
        for n in 1..=count {
            self.fail_call(method, done + n, error.clone());
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn calls(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn album_ids_named(&self, title: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .albums
            .iter()
            .filter(|album| album.title == title)
            .map(|album| album.id.clone())
            .collect()
    }

    pub fn album_photo_titles(&self, album_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let Some(album) = state.albums.iter().find(|album| album.id == album_id) else {
            return Vec::new();
        };
        let mut titles: Vec<String> = album
            .photos
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .filter_map(|id| state.photos.get(&id))
            .map(|photo| photo.title.clone())
            .collect();
        titles.sort();
        titles
    }

    /// Sorted photo ids of the album
    pub fn album_photo_ids(&self, album_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut ids = state
            .albums
            .iter()
            .find(|album| album.id == album_id)
            .map(|album| album.photos.clone())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn album_primary(&self, album_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .albums
            .iter()
            .find(|album| album.id == album_id)
            .map(|album| album.primary.clone())
    }

    // ------------------------------------------------------------------------
    // API simulation
    // ------------------------------------------------------------------------

    fn handle(
        &self,
        method: &str,
        params: &Params,
        upload: Option<UploadContent>,
    ) -> Result<Value, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let call = {
            let counter = state.calls.entry(method.to_string()).or_default();
            *counter += 1;
            *counter
        };
        if let Some(error) = state
            .failures
            .get_mut(method)
            .and_then(|failures| failures.remove(&call))
        {
            return Err(error);
        }

        match method {
            "flickr.photosets.getList" => {
                let (page, per_page) = paging(params);
                let (items, pages) = slice(&state.albums, page, per_page);
                let photosets: Vec<Value> = items
                    .iter()
                    .map(|album| {
                        json!({
                            "id": album.id,
                            "primary": album.primary,
                            "photos": album.photos.len().to_string(),
                            "videos": 0,
                            "title": {"_content": album.title},
                            "description": {"_content": album.description},
                        })
                    })
                    .collect();
                Ok(json!({
                    "stat": "ok",
                    "photosets": {"page": page, "pages": pages, "photoset": photosets}
                }))
            }
            "flickr.photosets.create" => {
                let primary = param(params, "primary_photo_id")?;
                if !state.photos.contains_key(&primary.parse::<u64>().unwrap_or(0)) {
                    return Err(api_error(2, "Invalid primary photo id"));
                }
                let id = format!("72{}", state.new_id());
                state.albums.push(FakeAlbum {
                    id: id.clone(),
                    title: param(params, "title")?,
                    description: params.get("description").cloned().unwrap_or_default(),
                    primary: primary.clone(),
                    photos: vec![primary],
                });
                Ok(json!({"stat": "ok", "photoset": {"id": id, "url": "https://example.test"}}))
            }
            "flickr.photosets.getPhotos" => {
                let album_id = param(params, "photoset_id")?;
                let (page, per_page) = paging(params);
                let album = state.album_mut(&album_id)?.clone();
                let (items, pages) = slice(&album.photos, page, per_page);
                let photos: Vec<Value> = items
                    .iter()
                    .map(|id| {
                        let title = id
                            .parse::<u64>()
                            .ok()
                            .and_then(|n| state.photos.get(&n))
                            .map(|p| p.title.clone())
                            .unwrap_or_default();
                        json!({
                            "id": id,
                            "title": title,
                            "isprimary": if *id == album.primary { "1" } else { "0" },
                            "ispublic": 0, "isfriend": 0, "isfamily": 0,
                        })
                    })
                    .collect();
                Ok(json!({
                    "stat": "ok",
                    "photoset": {
                        "id": album.id,
                        "page": page.to_string(),
                        "pages": pages.to_string(),
                        "photo": photos,
                    }
                }))
            }
            UPLOAD_METHOD => {
                if upload.is_none() {
                    return Err(api_error(2, "No photo specified"));
                }
                let id = state.new_id();
                state.photos.insert(
                    id,
                    FakePhoto {
                        title: param(params, "title")?,
                        tags: params
                            .get("tags")
                            .map(|t| t.split_whitespace().map(String::from).collect())
                            .unwrap_or_default(),
                    },
                );
                Ok(json!({"stat": "ok", "photoid": {"_content": id.to_string()}}))
            }
            "flickr.photosets.addPhoto" => {
                let photo_id = param(params, "photo_id")?;
                if !state.photos.contains_key(&photo_id.parse::<u64>().unwrap_or(0)) {
                    return Err(api_error(2, "Photo not found"));
                }
                let album = state.album_mut(&param(params, "photoset_id")?)?;
                if album.photos.contains(&photo_id) {
                    return Err(api_error(3, "Photo already in set"));
                }
                album.photos.push(photo_id);
                Ok(json!({"stat": "ok"}))
            }
            "flickr.photosets.removePhoto" => {
                let photo_id = param(params, "photo_id")?;
                let album = state.album_mut(&param(params, "photoset_id")?)?;
                let before = album.photos.len();
                album.photos.retain(|id| *id != photo_id);
                if album.photos.len() == before {
                    return Err(api_error(2, "Photo not in set"));
                }
                Ok(json!({"stat": "ok"}))
            }
            "flickr.photos.getInfo" => {
                let photo_id = param(params, "photo_id")?;
                let photo = state
                    .photos
                    .get(&photo_id.parse::<u64>().unwrap_or(0))
                    .ok_or_else(|| api_error(1, "Photo not found"))?;
                Ok(json!({
                    "stat": "ok",
                    "photo": {
                        "id": photo_id,
                        "title": {"_content": photo.title},
                        "visibility": {"ispublic": 0, "isfriend": 0, "isfamily": 0},
                    }
                }))
            }
            "flickr.photos.search" => {
                let tag = params.get("tags");
                // Most recent first.
                let hit = state
                    .photos
                    .iter()
                    .rev()
                    .find(|(_, photo)| tag.map_or(true, |tag| photo.tags.contains(tag)))
                    .map(|(id, _)| json!({"id": id.to_string()}));
                Ok(json!({"stat": "ok", "photos": {"photo": hit.into_iter().collect::<Vec<_>>()}}))
            }
            "flickr.test.login" => {
                Ok(json!({"stat": "ok", "user": {"id": "1@N01", "username": {"_content": "tester"}}}))
            }
            other => Err(api_error(112, &format!("Method \"{other}\" not found"))),
        }
    }
}

#[async_trait::async_trait]
impl IRemoteGateway for FakeGateway {
    async fn call(
        &self,
        method: &str,
        params: &Params,
        upload: Option<UploadContent>,
    ) -> Result<Value, GatewayError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let result = self.handle(method, params, upload);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn api_error(code: i64, message: &str) -> GatewayError {
    GatewayError::Api {
        code,
        message: message.to_string(),
    }
}

fn param(params: &Params, key: &str) -> Result<String, GatewayError> {
    params
        .get(key)
        .cloned()
        .ok_or_else(|| api_error(100, &format!("missing parameter {key}")))
}

fn paging(params: &Params) -> (usize, usize) {
    let page = params.get("page").and_then(|p| p.parse::<usize>().ok()).unwrap_or(1).max(1);
    let per_page = params
        .get("per_page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(500)
        .max(1);
    (page, per_page)
}

fn slice<T: Clone>(items: &[T], page: usize, per_page: usize) -> (Vec<T>, usize) {
    let pages = items.len().div_ceil(per_page).max(1);
    let start = (page - 1) * per_page;
    let chunk = items.iter().skip(start).take(per_page).cloned().collect();
    (chunk, pages)
}

// ============================================================================
// Fixtures
// ============================================================================

/// Test configuration: fast retries, small pages
pub fn test_config(workers: usize, max_retries: u32, page_size: u32) -> Config {
    ConfigBuilder::new()
        .sync_workers(workers)
        .sync_max_retries(max_retries)
        .sync_retry_delays_ms(1, 5)
        .sync_page_size(page_size)
        .build()
}

/// Writes `album/photo` files with a few bytes each under `root`
pub fn write_media(root: &Path, files: &[(&str, &str)]) {
    for (album, photo) in files {
        let dir = root.join(album);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(photo), format!("{album}/{photo}")).unwrap();
    }
}
