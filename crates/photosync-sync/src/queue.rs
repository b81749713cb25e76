//! Bounded work queue
//!
//! Drives the [`UploadCoordinator`] over a lazily produced sequence of
//! local files with at most `workers` files in flight. Files are pulled
//! from the source only when a slot frees up.
//!
//! Per-file failures are recorded in the [`SyncReport`] and never stop
//! sibling files. Only a fatal error from the source (discovery) aborts
//! the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use photosync_core::domain::LocalFileRef;
use serde::Serialize;
use tracing::{info, warn};

use crate::uploader::{UploadCoordinator, UploadOutcome};
use crate::SyncError;

// ============================================================================
// SyncReport
// ============================================================================

/// A file that could not be synced
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub album: String,
    pub photo: String,
    pub path: PathBuf,
    pub error: String,
}

/// Summary of a drained sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Files pulled from discovery
    pub discovered: u64,
    pub uploaded: u64,
    pub already_present: u64,
    pub failed: u64,
    /// Retries spent across all files
    pub retries: u64,
    pub failures: Vec<ItemFailure>,
    pub duration_ms: u64,
}

impl SyncReport {
    /// Records the outcome of one file
    pub fn record(&mut self, file: &LocalFileRef, result: Result<UploadOutcome, SyncError>) {
        match result {
            Ok(UploadOutcome::Uploaded { retries, .. }) => {
                self.uploaded += 1;
                self.retries += u64::from(retries);
            }
            Ok(UploadOutcome::AlreadyPresent) => self.already_present += 1,
            Err(err) => {
                warn!(
                    album = %file.album_name(),
                    photo = %file.photo_name(),
                    error = %err,
                    "Failed to sync file"
                );
                self.failed += 1;
                self.retries += u64::from(err.retries());
                self.failures.push(ItemFailure {
                    album: file.album_name().to_string(),
                    photo: file.photo_name().to_string(),
                    path: file.file_path().to_path_buf(),
                    error: err.to_string(),
                });
            }
        }
    }

    /// True when every discovered file is now present remotely
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

// ============================================================================
// WorkQueue
// ============================================================================

pub struct WorkQueue {
    coordinator: Arc<UploadCoordinator>,
    workers: usize,
}

impl WorkQueue {
    /// `workers` is clamped to at least one
    pub fn new(coordinator: Arc<UploadCoordinator>, workers: usize) -> Self {
        Self {
            coordinator,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every file through the coordinator and waits for the drain
    ///
    /// # Errors
    /// The first fatal error yielded by `files`; files still in flight are
    /// abandoned.
    #[tracing::instrument(skip(self, files), fields(workers = self.workers))]
    pub async fn run<S>(&self, files: S) -> Result<SyncReport, SyncError>
    where
        S: Stream<Item = Result<LocalFileRef, SyncError>>,
    {
        let started = Instant::now();
        let mut report = SyncReport::default();

        let mut outcomes = std::pin::pin!(files
            .map(|item| {
                let coordinator = Arc::clone(&self.coordinator);
                async move {
                    let file = item?;
                    let result = coordinator.ensure(&file).await;
                    Ok::<_, SyncError>((file, result))
                }
            })
            .buffer_unordered(self.workers));

        while let Some(outcome) = outcomes.next().await {
            let (file, result) = outcome?;
            report.discovered += 1;
            report.record(&file, result);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            discovered = report.discovered,
            uploaded = report.uploaded,
            already_present = report.already_present,
            failed = report.failed,
            retries = report.retries,
            duration_ms = report.duration_ms,
            "Sync drained"
        );
        Ok(report)
    }
}
