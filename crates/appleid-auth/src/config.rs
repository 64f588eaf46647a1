//! Client configuration
//!
//! Defaults point at Apple's production endpoint. The endpoint can be moved
//! (for a mock server, say) independently of the issuer, which stays the
//! canonical `https://appleid.apple.com` that Apple puts in every token.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppleIdError, Result};

/// Apple's identity service base URL
pub const APPLE_ENDPOINT: &str = "https://appleid.apple.com";

/// Issuer Apple puts in identity tokens (also the client secret audience)
pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

/// Authorization path (browser redirect, constructed only)
pub const AUTHORIZE_PATH: &str = "/auth/authorize";
/// Token exchange and refresh path
pub const TOKEN_PATH: &str = "/auth/token";
/// Token revocation path
pub const REVOKE_PATH: &str = "/auth/revoke";
/// Published signing keys path
pub const KEYS_PATH: &str = "/auth/keys";

/// Configuration for [`AppleIdClient`](crate::AppleIdClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleIdConfig {
    /// Base URL for the `/auth/*` endpoints
    pub endpoint: String,
    /// Expected `iss` of identity tokens and `aud` of client secrets
    pub issuer: String,
    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,
    /// Key refreshes per unknown key ID before giving up
    pub max_key_refreshes: u32,
}

impl Default for AppleIdConfig {
    fn default() -> Self {
        Self {
            endpoint: APPLE_ENDPOINT.to_string(),
            issuer: APPLE_ISSUER.to_string(),
            http_timeout_secs: 10,
            max_key_refreshes: 1,
        }
    }
}

impl AppleIdConfig {
    /// Parse the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns an input error when the endpoint is not an absolute URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint)
            .map_err(|e| AppleIdError::input(format!("invalid endpoint '{}': {e}", self.endpoint)))
    }

    /// HTTP request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Join an `/auth/*` path onto the endpoint
pub(crate) fn endpoint_path(endpoint: &Url, path: &str) -> Result<Url> {
    endpoint
        .join(path)
        .map_err(|e| AppleIdError::input(format!("invalid endpoint path '{path}': {e}")))
}

/// HTTPS is required except for loopback hosts (local mock servers)
pub(crate) fn require_secure(url: &Url) -> Result<()> {
    let loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
        Ok(())
    } else {
        Err(AppleIdError::input(format!(
            "Apple endpoint must use HTTPS (HTTP only allowed for localhost): {url}"
        )))
    }
}
