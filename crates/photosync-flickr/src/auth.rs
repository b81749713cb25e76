//! Credentials and OAuth 1.0a request signing
//!
//! Flickr signs every call with OAuth 1.0a using HMAC-SHA1. The access token
//! is obtained out of band; this module only loads it and signs requests.
//!
//! ## Components
//!
//! - [`Credentials`] - consumer key/secret and access token/secret
//! - [`OAuthSigner`] - adds the `oauth_*` parameters and the signature

use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use photosync_core::config::expand_tilde;
use photosync_core::ports::Params;
use serde::Deserialize;
use sha1::Sha1;
use tracing::debug;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

// ============================================================================
// Credentials
// ============================================================================

/// API and access-token credentials, as stored in the credentials file
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("oauth_token", &self.oauth_token)
            .field("oauth_token_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Loads credentials from a JSON file; a leading `~` is expanded
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_tilde(path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        let credentials: Credentials = serde_json::from_str(&content)
            .with_context(|| format!("Invalid credentials file {}", path.display()))?;

        for (field, value) in [
            ("consumer_key", &credentials.consumer_key),
            ("consumer_secret", &credentials.consumer_secret),
            ("oauth_token", &credentials.oauth_token),
            ("oauth_token_secret", &credentials.oauth_token_secret),
        ] {
            if value.trim().is_empty() {
                bail!("Credentials file {} has an empty {}", path.display(), field);
            }
        }

        debug!(path = %path.display(), consumer_key = %credentials.consumer_key, "Loaded credentials");
        Ok(credentials)
    }
}

// ============================================================================
// OAuthSigner
// ============================================================================

/// Signs request parameters with OAuth 1.0a HMAC-SHA1
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: Credentials,
}

impl OAuthSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn consumer_key(&self) -> &str {
        &self.credentials.consumer_key
    }

    /// Returns `params` extended with the `oauth_*` parameters and signature
    ///
    /// `url` must not carry a query string; every request parameter has to
    /// be in `params` so it is covered by the signature.
    pub fn sign(&self, http_method: &str, url: &str, params: &Params) -> Params {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        self.sign_with(http_method, url, params, &nonce, timestamp)
    }

    fn sign_with(
        &self,
        http_method: &str,
        url: &str,
        params: &Params,
        nonce: &str,
        timestamp: i64,
    ) -> Params {
        let mut signed = params.clone();
        signed.insert(
            "oauth_consumer_key".into(),
            self.credentials.consumer_key.clone(),
        );
        signed.insert("oauth_nonce".into(), nonce.to_string());
        signed.insert("oauth_signature_method".into(), SIGNATURE_METHOD.into());
        signed.insert("oauth_timestamp".into(), timestamp.to_string());
        signed.insert("oauth_token".into(), self.credentials.oauth_token.clone());
        signed.insert("oauth_version".into(), OAUTH_VERSION.into());

        let base = signature_base_string(http_method, url, &signed);
        let key = format!(
            "{}&{}",
            percent_encode(&self.credentials.consumer_secret),
            percent_encode(&self.credentials.oauth_token_secret)
        );
        signed.insert("oauth_signature".into(), hmac_sha1_base64(&key, &base));
        signed
    }
}

/// RFC 3986 percent-encoding (unreserved characters stay as-is)
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn signature_base_string(http_method: &str, url: &str, params: &Params) -> String {
    // Parameters are sorted by encoded key, then encoded value.
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.sort();
    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        http_method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

fn hmac_sha1_base64(key: &str, data: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
