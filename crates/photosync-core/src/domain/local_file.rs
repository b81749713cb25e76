//! Local file references produced by directory discovery

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A local media file together with the album and photo names it maps to
///
/// The album name is the name of the file's immediate parent directory and
/// the photo name is the file name itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileRef {
    album_name: String,
    photo_name: String,
    file_path: PathBuf,
    size: u64,
}

impl LocalFileRef {
    pub fn new(
        album_name: impl Into<String>,
        photo_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        size: u64,
    ) -> Self {
        Self {
            album_name: album_name.into(),
            photo_name: photo_name.into(),
            file_path: file_path.into(),
            size,
        }
    }

    /// Derives album and photo names from `path`
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the path has no file name
    /// or no named parent directory, or if either is not valid UTF-8.
    pub fn from_path(path: impl AsRef<Path>, size: u64) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let photo_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!("no file name: {}", path.display()))
            })?;
        let album_name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "no parent directory name: {}",
                    path.display()
                ))
            })?;

        Ok(Self::new(album_name, photo_name, path, size))
    }

    pub fn album_name(&self) -> &str {
        &self.album_name
    }

    pub fn photo_name(&self) -> &str {
        &self.photo_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
