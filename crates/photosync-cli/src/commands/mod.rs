//! Subcommands and the setup they share

pub mod api;
pub mod cleanup;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use photosync_core::config::Config;
use photosync_core::ports::IRemoteGateway;
use photosync_flickr::FlickrGateway;
use tracing::info;

/// Applies a `--credentials` override and rejects an invalid configuration
pub(crate) fn prepare_config(mut config: Config, credentials: Option<&PathBuf>) -> Result<Config> {
    if let Some(path) = credentials {
        config.remote.credentials = path.clone();
    }
    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

/// Loads the credentials and builds the Flickr gateway
pub(crate) fn connect(config: &Config) -> Result<Arc<dyn IRemoteGateway>> {
    let gateway = FlickrGateway::from_config(&config.remote).with_context(|| {
        format!(
            "Failed to set up Flickr client with credentials {}",
            config.remote.credentials_path().display()
        )
    })?;
    info!(
        credentials = %config.remote.credentials_path().display(),
        requests_per_hour = config.remote.requests_per_hour,
        "Connected gateway"
    );
    Ok(Arc::new(gateway))
}
