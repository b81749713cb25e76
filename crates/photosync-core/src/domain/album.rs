//! Album domain entity
//!
//! An [`Album`] is the in-memory view of one remote photoset. Its photo map
//! is only trustworthy once the album has been fully paged from the remote
//! service, so every lookup by photo name must wait for [`AlbumState::Ready`].
//!
//! ## State Machine
//!
//! ```text
//!                 begin_creation              complete_creation
//!  ┌────────────┐ (no id) ─────► ┌──────────┐ ───────────────► ┌─────────┐ finish_listing ┌───────┐
//!  │ Unresolved │                │ Creating │                  │ Listing │ ─────────────► │ Ready │
//!  └────────────┘ ──────────────────────────────────────────► └─────────┘                └───────┘
//!        ▲          begin_listing (id known)                        │
//!        │                                                          │
//!        └──────────────────────── abort ◄──────────────────────────┘
//! ```
//!
//! `abort` keeps the assigned id and the set of completed listing pages, so a
//! later attempt neither re-creates the album nor re-fetches finished pages.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{AlbumId, PhotoId};
use super::photo::Photo;

/// Resolution state of an album
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumState {
    /// Nothing in flight; may or may not have a remote id yet
    #[default]
    Unresolved,
    /// Creation request in flight
    Creating,
    /// Paging photos from the remote service
    Listing,
    /// Photo map complete
    Ready,
}

impl AlbumState {
    pub fn name(&self) -> &'static str {
        match self {
            AlbumState::Unresolved => "Unresolved",
            AlbumState::Creating => "Creating",
            AlbumState::Listing => "Listing",
            AlbumState::Ready => "Ready",
        }
    }
}

impl fmt::Display for AlbumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named remote collection of photos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    id: Option<AlbumId>,
    name: String,
    description: String,
    primary_photo_id: Option<PhotoId>,
    /// Photos + videos, as reported remotely or counted locally once listed
    photo_count: u64,
    photos: HashMap<String, Photo>,
    /// Listing pages already merged into `photos`; cleared on Ready
    completed_pages: BTreeSet<u32>,
    /// Page count reported by the most recent listing response
    total_pages: Option<u32>,
    state: AlbumState,
}

impl Album {
    /// Creates an album that does not exist remotely yet
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAlbumName` if `name` is empty
    pub fn new_unresolved(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidAlbumName(name));
        }
        Ok(Self {
            id: None,
            name,
            description: description.into(),
            primary_photo_id: None,
            photo_count: 0,
            photos: HashMap::new(),
            completed_pages: BTreeSet::new(),
            total_pages: None,
            state: AlbumState::Unresolved,
        })
    }

    /// Creates an album from a remote listing entry; photos are not loaded
    pub fn from_remote(
        id: AlbumId,
        name: impl Into<String>,
        description: impl Into<String>,
        primary_photo_id: Option<PhotoId>,
        photo_count: u64,
    ) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            description: description.into(),
            primary_photo_id,
            photo_count,
            photos: HashMap::new(),
            completed_pages: BTreeSet::new(),
            total_pages: None,
            state: AlbumState::Unresolved,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> Option<&AlbumId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn primary_photo_id(&self) -> Option<&PhotoId> {
        self.primary_photo_id.as_ref()
    }

    pub fn photo_count(&self) -> u64 {
        self.photo_count
    }

    pub fn state(&self) -> AlbumState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == AlbumState::Ready
    }

    /// Photos keyed by name. Only complete when the album is Ready.
    pub fn photos(&self) -> &HashMap<String, Photo> {
        &self.photos
    }

    pub fn find_photo(&self, name: &str) -> Option<&Photo> {
        self.photos.get(name)
    }

    pub fn contains_photo(&self, name: &str) -> bool {
        self.photos.contains_key(name)
    }

    pub fn completed_pages(&self) -> &BTreeSet<u32> {
        &self.completed_pages
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Unresolved (without id) -> Creating
    pub fn begin_creation(&mut self, primary_photo_id: PhotoId) -> Result<(), DomainError> {
        if self.state != AlbumState::Unresolved || self.id.is_some() {
            return Err(self.invalid_transition(AlbumState::Creating));
        }
        self.primary_photo_id = Some(primary_photo_id);
        self.state = AlbumState::Creating;
        Ok(())
    }

    /// Creating -> Listing, recording the remote-assigned id
    pub fn complete_creation(&mut self, id: AlbumId) -> Result<(), DomainError> {
        if self.state != AlbumState::Creating {
            return Err(self.invalid_transition(AlbumState::Listing));
        }
        self.id = Some(id);
        // A freshly created album holds only its cover photo remotely.
        self.state = AlbumState::Listing;
        Ok(())
    }

    /// Unresolved (with id) -> Listing
    pub fn begin_listing(&mut self) -> Result<(), DomainError> {
        if self.state != AlbumState::Unresolved || self.id.is_none() {
            return Err(self.invalid_transition(AlbumState::Listing));
        }
        self.state = AlbumState::Listing;
        Ok(())
    }

    /// Lowest listing page that still has to be fetched, if any
    pub fn next_page_to_fetch(&self) -> Option<u32> {
        match self.total_pages {
            None => Some(1),
            Some(total) => (1..=total).find(|page| !self.completed_pages.contains(page)),
        }
    }

    /// Merges one listing page into the photo map
    ///
    /// Photos are keyed by name and overwrite earlier entries, so re-fetching
    /// a page never creates duplicates. `total_pages` replaces the previous
    /// value because the remote count can change while paging.
    pub fn record_page(
        &mut self,
        page: u32,
        total_pages: u32,
        photos: impl IntoIterator<Item = Photo>,
    ) -> Result<(), DomainError> {
        if self.state != AlbumState::Listing {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: "Listing (record_page)".to_string(),
            });
        }
        for photo in photos {
            self.photos.insert(photo.name().to_string(), photo);
        }
        self.completed_pages.insert(page);
        self.total_pages = Some(total_pages);
        Ok(())
    }

    /// Listing -> Ready, once every page has been merged
    pub fn finish_listing(&mut self) -> Result<(), DomainError> {
        if self.state != AlbumState::Listing || self.next_page_to_fetch().is_some() {
            return Err(self.invalid_transition(AlbumState::Ready));
        }
        self.completed_pages.clear();
        self.total_pages = None;
        self.photo_count = self.photos.len() as u64;
        self.state = AlbumState::Ready;
        Ok(())
    }

    /// Creating/Listing -> Unresolved after a failed attempt
    ///
    /// The id and completed pages are kept so the next attempt resumes.
    pub fn abort(&mut self) {
        if matches!(self.state, AlbumState::Creating | AlbumState::Listing) {
            self.state = AlbumState::Unresolved;
        }
    }

    /// Inserts `photo` unless a photo with the same name is already present
    ///
    /// Returns `true` if the photo was inserted. This is the only mutation
    /// allowed after the album is Ready.
    pub fn insert_photo_if_absent(&mut self, photo: Photo) -> Result<bool, DomainError> {
        if !self.is_ready() {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: "Ready (insert_photo)".to_string(),
            });
        }
        if self.photos.contains_key(photo.name()) {
            return Ok(false);
        }
        self.photos.insert(photo.name().to_string(), photo);
        self.photo_count += 1;
        Ok(true)
    }

    fn invalid_transition(&self, to: AlbumState) -> DomainError {
        DomainError::InvalidState {
            from: self.state.name().to_string(),
            to: to.name().to_string(),
        }
    }
}
