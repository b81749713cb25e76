//! Local media discovery
//!
//! Walks a directory tree and yields a [`LocalFileRef`] for every media
//! file worth syncing. The album is the name of the file's parent
//! directory and the photo name is the file name.
//!
//! Skipped:
//! - directories, symlinks and other non-regular files
//! - hidden files, and everything under hidden directories
//! - files at or above the configured size limit
//! - extensions outside the configured list
//!
//! Walking happens on a blocking thread that feeds a bounded channel, so
//! the tree is only read as fast as the work queue consumes it.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, Stream};
use photosync_core::config::DiscoveryConfig;
use photosync_core::domain::LocalFileRef;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::SyncError;

#[derive(Debug, Clone)]
pub struct FileDiscovery {
    root: PathBuf,
    config: DiscoveryConfig,
}

impl FileDiscovery {
    /// Prepares discovery under `root`
    ///
    /// # Errors
    /// `SyncError::Setup` if `root` is not a readable directory
    pub fn new(root: impl Into<PathBuf>, config: DiscoveryConfig) -> Result<Self, SyncError> {
        let root = root.into();
        let metadata = std::fs::metadata(&root).map_err(|err| {
            SyncError::Setup(format!("Cannot access directory {}: {err}", root.display()))
        })?;
        if !metadata.is_dir() {
            return Err(SyncError::Setup(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        std::fs::read_dir(&root).map_err(|err| {
            SyncError::Setup(format!("Cannot read directory {}: {err}", root.display()))
        })?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the tree on the current thread
    ///
    /// Stops at the first traversal error.
    pub fn scan(&self) -> Result<Vec<LocalFileRef>, SyncError> {
        self.walk().collect()
    }

    /// Streams discovered files, walking on a blocking thread
    ///
    /// At most `buffer` files are discovered ahead of the consumer. A
    /// traversal error is yielded as the last item.
    pub fn into_stream(self, buffer: usize) -> impl Stream<Item = Result<LocalFileRef, SyncError>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        tokio::task::spawn_blocking(move || {
            for item in self.walk() {
                let stop = item.is_err();
                if tx.blocking_send(item).is_err() {
                    debug!("Discovery consumer went away");
                    return;
                }
                if stop {
                    return;
                }
            }
            debug!(root = %self.root.display(), "Discovery finished");
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    }

    fn walk(&self) -> impl Iterator<Item = Result<LocalFileRef, SyncError>> + '_ {
        let include_hidden = self.config.include_hidden;
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| include_hidden || entry.depth() == 0 || !is_hidden(entry))
            .filter_map(move |entry| match entry {
                Ok(entry) => self.accept(&entry).map(Ok),
                Err(err) => Some(Err(SyncError::Discovery(err.to_string()))),
            })
    }

    fn accept(&self, entry: &DirEntry) -> Option<LocalFileRef> {
        if !entry.file_type().is_file() || !self.config.accepts_extension(entry.path()) {
            return None;
        }
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "Skipping unreadable file");
                return None;
            }
        };
        if size >= self.config.max_file_size_bytes {
            debug!(path = %entry.path().display(), size, "Skipping oversized file");
            return None;
        }
        match LocalFileRef::from_path(entry.path(), size) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "Skipping file");
                None
            }
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
