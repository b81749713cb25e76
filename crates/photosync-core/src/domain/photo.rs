//! Photo domain entity
//!
//! A [`Photo`] either mirrors an item that already exists remotely (it has an
//! id and no local file) or represents a local file on its way up.
//!
//! ## State Machine
//!
//! ```text
//!     ┌─────────┐  start_upload  ┌───────────┐  complete_upload  ┌──────────┐
//!     │ Pending │ ─────────────► │ Uploading │ ────────────────► │ Uploaded │
//!     └─────────┘                └───────────┘                   └──────────┘
//!          ▲                           │
//!          │         retry             │ fail
//!          └──────────────────── ┌─────▼────┐
//!                                │  Failed  │
//!                                └──────────┘
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::PhotoId;

/// Lifecycle state of a photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoState {
    /// A local file not yet confirmed remote
    Pending,
    /// Upload request in flight
    Uploading,
    /// Exists remotely; `id` is set
    Uploaded,
    /// Upload failed with the given reason
    Failed(String),
}

impl PhotoState {
    /// Name of the state, without payload
    pub fn name(&self) -> &'static str {
        match self {
            PhotoState::Pending => "Pending",
            PhotoState::Uploading => "Uploading",
            PhotoState::Uploaded => "Uploaded",
            PhotoState::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for PhotoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoState::Failed(reason) => write!(f, "Failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Visibility flags of a remote photo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub is_public: bool,
    pub is_friend: bool,
    pub is_family: bool,
}

impl Visibility {
    /// Private to the owner; what every upload uses
    pub const PRIVATE: Visibility = Visibility {
        is_public: false,
        is_friend: false,
        is_family: false,
    };
}

/// A single remote media item, or a local file about to become one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    id: Option<PhotoId>,
    name: String,
    visibility: Visibility,
    is_primary: bool,
    file_path: Option<PathBuf>,
    state: PhotoState,
}

impl Photo {
    /// A photo that already exists remotely
    pub fn remote(id: PhotoId, name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            visibility,
            is_primary: false,
            file_path: None,
            state: PhotoState::Uploaded,
        }
    }

    /// A local file that has not been uploaded yet
    pub fn pending(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            id: None,
            name: name.into(),
            visibility: Visibility::PRIVATE,
            is_primary: false,
            file_path: Some(file_path.into()),
            state: PhotoState::Pending,
        }
    }

    /// Marks this photo as its album's cover
    #[must_use]
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Replaces the visibility flags, e.g. with the ones reported remotely
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn id(&self) -> Option<&PhotoId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn state(&self) -> &PhotoState {
        &self.state
    }

    /// True once the photo exists remotely
    pub fn is_uploaded(&self) -> bool {
        matches!(self.state, PhotoState::Uploaded) && self.id.is_some()
    }

    /// Pending (or Failed, for a retry) -> Uploading
    pub fn start_upload(&mut self) -> Result<(), DomainError> {
        match self.state {
            PhotoState::Pending | PhotoState::Failed(_) => {
                self.state = PhotoState::Uploading;
                Ok(())
            }
            _ => Err(self.invalid_transition("Uploading")),
        }
    }

    /// Uploading -> Uploaded, assigning the remote id
    pub fn complete_upload(&mut self, id: PhotoId) -> Result<(), DomainError> {
        if self.state != PhotoState::Uploading {
            return Err(self.invalid_transition("Uploaded"));
        }
        self.id = Some(id);
        self.state = PhotoState::Uploaded;
        Ok(())
    }

    /// Uploading -> Failed
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if self.state != PhotoState::Uploading {
            return Err(self.invalid_transition("Failed"));
        }
        self.state = PhotoState::Failed(reason.into());
        Ok(())
    }

    fn invalid_transition(&self, to: &str) -> DomainError {
        DomainError::InvalidState {
            from: self.state.name().to_string(),
            to: to.to_string(),
        }
    }
}
