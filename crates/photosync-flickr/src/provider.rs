//! FlickrGateway - IRemoteGateway implementation for Flickr
//!
//! Routes calls to the REST or upload endpoint of a [`FlickrClient`] and
//! classifies failures into [`GatewayError`].

use std::sync::Arc;

use async_trait::async_trait;
use photosync_core::config::RemoteConfig;
use photosync_core::ports::{GatewayError, IRemoteGateway, Params, UploadContent, UPLOAD_METHOD};
use serde_json::Value;
use tracing::debug;

use crate::auth::Credentials;
use crate::client::FlickrClient;
use crate::rate_limit::RateLimitConfig;
use crate::FlickrError;

/// [`IRemoteGateway`] backed by the Flickr API
#[derive(Debug, Clone)]
pub struct FlickrGateway {
    client: Arc<FlickrClient>,
}

impl FlickrGateway {
    pub fn new(client: FlickrClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Builds a gateway from the `remote` configuration section
    ///
    /// Loads the credentials file named by the configuration.
    pub fn from_config(config: &RemoteConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::load(&config.credentials_path())?;
        let client = FlickrClient::with_options(
            credentials,
            config.rest_url.clone(),
            config.upload_url.clone(),
            config.timeout(),
            RateLimitConfig::per_hour(config.requests_per_hour),
        )?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &FlickrClient {
        &self.client
    }
}

#[async_trait]
impl IRemoteGateway for FlickrGateway {
    async fn call(
        &self,
        method: &str,
        params: &Params,
        upload: Option<UploadContent>,
    ) -> Result<Value, GatewayError> {
        let result = if method == UPLOAD_METHOD {
            match upload {
                Some(content) => self.client.upload(params, content).await,
                None => {
                    return Err(GatewayError::InvalidResponse(
                        "upload called without file content".into(),
                    ))
                }
            }
        } else {
            if upload.is_some() {
                debug!(method, "Ignoring file content for non-upload method");
            }
            self.client.call(method, params).await
        };

        result.map_err(|err: FlickrError| {
            debug!(method, error = %err, "Remote call failed");
            GatewayError::from(err)
        })
    }
}
