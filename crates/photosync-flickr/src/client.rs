//! Flickr HTTP client
//!
//! Signs and sends REST calls and media uploads, maps HTTP failures onto
//! [`FlickrError`] and normalizes response bodies.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use photosync_core::ports::params;
//! use photosync_flickr::auth::Credentials;
//! use photosync_flickr::client::FlickrClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let credentials = Credentials::load("~/.flickr".as_ref())?;
//! let client = FlickrClient::new(credentials)?;
//! let login = client.call("flickr.test.login", &params([])).await?;
//! println!("{}", login["user"]["username"]["_content"]);
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use photosync_core::ports::{Params, UploadContent};
use reqwest::{multipart, Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{percent_encode, Credentials, OAuthSigner};
use crate::rate_limit::{parse_retry_after, RateLimitConfig, RateLimiter};
use crate::{response, FlickrError};

/// Production REST endpoint
pub const REST_URL: &str = "https://api.flickr.com/services/rest/";

/// Production upload endpoint
pub const UPLOAD_URL: &str = "https://up.flickr.com/services/upload/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Multipart field carrying the media binary
const PHOTO_FIELD: &str = "photo";

// ============================================================================
// FlickrClient
// ============================================================================

/// HTTP client for the Flickr REST and upload endpoints
///
/// Cheap to share behind an `Arc`; every request goes through the same
/// [`RateLimiter`].
pub struct FlickrClient {
    client: Client,
    signer: OAuthSigner,
    rest_url: String,
    upload_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for FlickrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlickrClient")
            .field("rest_url", &self.rest_url)
            .field("upload_url", &self.upload_url)
            .field("consumer_key", &self.signer.consumer_key())
            .finish()
    }
}

impl FlickrClient {
    /// Creates a client for the production endpoints
    pub fn new(credentials: Credentials) -> Result<Self, FlickrError> {
        Self::with_base_urls(credentials, REST_URL, UPLOAD_URL)
    }

    /// Creates a client with custom endpoints (useful for testing)
    pub fn with_base_urls(
        credentials: Credentials,
        rest_url: impl Into<String>,
        upload_url: impl Into<String>,
    ) -> Result<Self, FlickrError> {
        Self::with_options(
            credentials,
            rest_url,
            upload_url,
            DEFAULT_TIMEOUT,
            RateLimitConfig::default(),
        )
    }

    /// Creates a client with every knob exposed
    pub fn with_options(
        credentials: Credentials,
        rest_url: impl Into<String>,
        upload_url: impl Into<String>,
        timeout: Duration,
        rate_limit: RateLimitConfig,
    ) -> Result<Self, FlickrError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("photosync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            signer: OAuthSigner::new(credentials),
            rest_url: rest_url.into(),
            upload_url: upload_url.into(),
            rate_limiter: Arc::new(RateLimiter::new(rate_limit)),
        })
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Base parameters every request carries
    fn base_params(&self, method: Option<&str>, params: &Params) -> Params {
        let mut all = params.clone();
        if let Some(method) = method {
            all.insert("method".into(), method.to_string());
        }
        all.insert("api_key".into(), self.signer.consumer_key().to_string());
        all.insert("format".into(), "json".into());
        all.insert("nojsoncallback".into(), "1".into());
        all
    }

    /// Calls a REST method with a signed GET request
    ///
    /// # Returns
    /// The normalized response document, after the `stat` check
    #[tracing::instrument(skip(self, params), fields(params = params.len()))]
    pub async fn call(&self, method: &str, params: &Params) -> Result<Value, FlickrError> {
        let signed = self
            .signer
            .sign("GET", &self.rest_url, &self.base_params(Some(method), params));
        let url = format!("{}?{}", self.rest_url, encode_query(&signed));

        self.rate_limiter.acquire().await;
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Uploads a media file with a signed multipart POST
    ///
    /// Every text field is covered by the signature; the binary part is not.
    #[tracing::instrument(skip(self, params, content), fields(file = %content.file_name, bytes = content.data.len()))]
    pub async fn upload(
        &self,
        params: &Params,
        content: UploadContent,
    ) -> Result<Value, FlickrError> {
        let signed = self
            .signer
            .sign("POST", &self.upload_url, &self.base_params(None, params));

        let mut form = multipart::Form::new();
        for (key, value) in signed {
            form = form.text(key, value);
        }
        let part = multipart::Part::bytes(content.data).file_name(content.file_name);
        form = form.part(PHOTO_FIELD, part);

        self.rate_limiter.acquire().await;
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Maps the HTTP status and body onto a result
    async fn handle_response(&self, response: Response) -> Result<Value, FlickrError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            self.rate_limiter.on_throttle();
            warn!(retry_after_ms = retry_after.map(|d| d.as_millis() as u64), "Received 429");
            return Err(FlickrError::TooManyRequests { retry_after });
        }

        let body = response.text().await?;

        if status.is_server_error() {
            return Err(FlickrError::ServerError(format!("HTTP {status}: {}", body.trim())));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FlickrError::Unauthorized {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }
        if !status.is_success() {
            // OAuth problems arrive as 4xx querystrings; keep their message.
            return match response::normalize(&body) {
                Err(err @ FlickrError::Api { .. }) => Err(err),
                _ => Err(FlickrError::Api {
                    code: i64::from(status.as_u16()),
                    message: body.trim().to_string(),
                }),
            };
        }

        self.rate_limiter.on_success();
        let value = response::normalize(&body)?;
        debug!("Request succeeded");
        Ok(value)
    }
}

/// Builds a query string with RFC 3986 encoding, the same encoding the
/// signature was computed over
fn encode_query(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
