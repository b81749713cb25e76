//! Remote gateway port (driven/secondary port)
//!
//! Every interaction with the photo service goes through one primitive:
//! invoke a named remote method with string parameters and get back a
//! decoded response document. Signing, transport, throttling and response
//! normalization are the adapter's business.
//!
//! ## Design Notes
//!
//! - Errors are classified into [`GatewayError`] so the sync engine can tell
//!   transient failures (worth retrying) from permanent ones.
//! - `GatewayError` is `Clone` because a single failed album resolution is
//!   delivered to every task that was waiting on it.
//! - The response is the decoded document *after* the status check, as a
//!   `serde_json::Value`. Callers map it onto their own DTOs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Named string parameters of a remote call
///
/// A `BTreeMap` so parameters are always enumerated in sorted order, which
/// is what request signing needs.
pub type Params = BTreeMap<String, String>;

/// Method name used for media uploads
///
/// The upload endpoint is not a regular REST method; gateways route calls
/// with this name to the upload endpoint and expect an [`UploadContent`].
pub const UPLOAD_METHOD: &str = "upload";

// ============================================================================
// UploadContent
// ============================================================================

/// Binary payload attached to an upload call
#[derive(Debug, Clone)]
pub struct UploadContent {
    /// File name sent with the multipart part
    pub file_name: String,
    /// Raw file contents
    pub data: Vec<u8>,
}

impl UploadContent {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

// ============================================================================
// GatewayError
// ============================================================================

/// Classified failure of a remote call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Connection, timeout or server-side (5xx) failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service asked us to slow down
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Server-provided delay, if any
        retry_after: Option<Duration>,
    },

    /// The service answered with an error status
    #[error("API error {code}: {message}")]
    Api {
        /// Service-specific error code
        code: i64,
        /// Human-readable message from the service
        message: String,
    },

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A local file needed for the call could not be read
    #[error("Local file error for {path}: {message}")]
    LocalFile {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error message
        message: String,
    },
}

impl GatewayError {
    /// Whether retrying the same call can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::RateLimited { .. }
        )
    }

    /// Service error code, for `Api` errors
    pub fn code(&self) -> Option<i64> {
        match self {
            GatewayError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Delay requested by the service, for `RateLimited` errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

// ============================================================================
// IRemoteGateway trait
// ============================================================================

/// Port trait for the remote photo service
///
/// Implementations must be safe to call concurrently from many tasks.
#[async_trait::async_trait]
pub trait IRemoteGateway: Send + Sync {
    /// Invokes `method` with `params`
    ///
    /// `upload` carries the file payload when `method` is [`UPLOAD_METHOD`]
    /// and is `None` otherwise.
    ///
    /// # Returns
    /// The decoded response document, after the service status was checked
    async fn call(
        &self,
        method: &str,
        params: &Params,
        upload: Option<UploadContent>,
    ) -> Result<serde_json::Value, GatewayError>;
}

/// Builds a [`Params`] map from string pairs
pub fn params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
