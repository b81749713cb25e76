//! Photosync Flickr - remote gateway for the Flickr REST and upload APIs
//!
//! Provides an async client for:
//! - OAuth 1.0a request signing (HMAC-SHA1) from a JSON credentials file
//! - REST method calls and multipart media uploads
//! - Normalizing JSON, XML and querystring response bodies into one shape
//! - Proactive client-side rate limiting
//!
//! ## Modules
//!
//! - [`auth`] - Credentials loading and request signing
//! - [`client`] - HTTP client for the REST and upload endpoints
//! - [`response`] - Response body normalization and status checks
//! - [`rate_limit`] - Adaptive token bucket
//! - [`provider`] - [`IRemoteGateway`](photosync_core::ports::IRemoteGateway)
//!   implementation

pub mod auth;
pub mod client;
pub mod provider;
pub mod rate_limit;
pub mod response;

use std::time::Duration;

use photosync_core::ports::GatewayError;
use thiserror::Error;

pub use provider::FlickrGateway;

/// Errors that can occur when communicating with Flickr
#[derive(Debug, Error)]
pub enum FlickrError {
    /// Credentials were rejected at the HTTP level (401/403)
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Server-provided delay, if a `Retry-After` header was present
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The service answered with `stat != "ok"`
    #[error("API error {code}: {message}")]
    Api {
        /// Flickr error code
        code: i64,
        /// Flickr error message
        message: String,
    },

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<FlickrError> for GatewayError {
    fn from(err: FlickrError) -> Self {
        match err {
            FlickrError::Unauthorized { status, message } => GatewayError::Api {
                code: i64::from(status),
                message,
            },
            FlickrError::TooManyRequests { retry_after } => {
                GatewayError::RateLimited { retry_after }
            }
            FlickrError::ServerError(message) => GatewayError::Transport(message),
            FlickrError::NetworkError(e) if e.is_decode() => {
                GatewayError::InvalidResponse(e.to_string())
            }
            FlickrError::NetworkError(e) => GatewayError::Transport(e.to_string()),
            FlickrError::Api { code, message } => GatewayError::Api { code, message },
            FlickrError::InvalidResponse(message) => GatewayError::InvalidResponse(message),
        }
    }
}
