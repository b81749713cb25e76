//! Sync engine
//!
//! The [`SyncEngine`] wires the cache, resolver, coordinator and queue
//! around one remote gateway and exposes the two operations the CLI runs.
//!
//! ## Sync Flow
//!
//! 1. **Setup**: check the root directory (fatal if unreadable)
//! 2. **Seed**: list every remote album into the cache
//! 3. **Drain**: stream discovered files through the bounded work queue
//! 4. **Report**: return counts of uploaded, already present and failed files
//!
//! ## Cleanup Flow
//!
//! List every remote album and merge same-named albums into the largest.

use std::path::Path;
use std::sync::Arc;

use photosync_core::config::Config;
use photosync_core::ports::IRemoteGateway;
use tracing::info;

use crate::cache::EntityCache;
use crate::discovery::FileDiscovery;
use crate::merge::{AlbumMerger, MergeReport};
use crate::queue::{SyncReport, WorkQueue};
use crate::remote::RemoteApi;
use crate::resolver::AlbumResolver;
use crate::retry::RetryPolicy;
use crate::uploader::UploadCoordinator;
use crate::SyncError;

/// Files discovered ahead of the workers, per worker
const DISCOVERY_BUFFER_PER_WORKER: usize = 2;

pub struct SyncEngine {
    config: Config,
    cache: Arc<EntityCache>,
    resolver: Arc<AlbumResolver>,
    coordinator: Arc<UploadCoordinator>,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn IRemoteGateway>, config: Config) -> Self {
        let retry = RetryPolicy::from_config(&config.sync);
        let cache = Arc::new(EntityCache::new(
            RemoteApi::new(gateway),
            retry,
            &config.sync,
        ));
        let resolver = Arc::new(AlbumResolver::new(Arc::clone(&cache)));
        let coordinator = Arc::new(UploadCoordinator::new(
            Arc::clone(&resolver),
            retry,
            config.sync.description.clone(),
        ));
        Self {
            config,
            cache,
            resolver,
            coordinator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<AlbumResolver> {
        &self.resolver
    }

    pub fn coordinator(&self) -> &Arc<UploadCoordinator> {
        &self.coordinator
    }

    /// Uploads every media file under `root` that its album does not hold yet
    ///
    /// # Errors
    /// Fatal conditions only: unreadable root, failed album listing, or a
    /// discovery error. Per-file failures are part of the report.
    #[tracing::instrument(skip(self), fields(root = %root.display()))]
    pub async fn sync(&self, root: &Path) -> Result<SyncReport, SyncError> {
        let discovery = FileDiscovery::new(root, self.config.discovery.clone())?;
        let albums = self.cache.seed().await?;

        let workers = self.config.sync.workers.max(1);
        info!(albums, workers, "Starting sync");
        let queue = WorkQueue::new(Arc::clone(&self.coordinator), workers);
        queue
            .run(discovery.into_stream(workers * DISCOVERY_BUFFER_PER_WORKER))
            .await
    }

    /// Merges duplicate albums; see [`AlbumMerger`]
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self, dry_run: bool) -> Result<MergeReport, SyncError> {
        AlbumMerger::new(Arc::clone(&self.cache))
            .merge_duplicates(dry_run)
            .await
    }
}
