//! Fetching Apple's key set document
//!
//! `GET {endpoint}/auth/keys` returns `{ "keys": [ { "kid", "n", "e", ... } ] }`.
//! The fetcher does no caching and no retries; [`KeyResolver`] owns both.
//!
//! [`KeyResolver`]: crate::resolver::KeyResolver

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};
use url::Url;

use crate::config::{KEYS_PATH, endpoint_path, require_secure};
use crate::error::{AppleIdError, Result};
use crate::keys::AppleJwk;

/// Source of Apple's currently published key records
#[async_trait]
pub trait JwksFetcher: Send + Sync + std::fmt::Debug {
    /// Fetch the current key records
    ///
    /// # Errors
    ///
    /// Fetch errors for transport failures and non-JSON bodies, format errors
    /// when the document has no well-formed `keys` array.
    async fn fetch_keys(&self) -> Result<Vec<AppleJwk>>;
}

/// JWKS fetcher over HTTP
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    keys_url: Url,
    http_client: reqwest::Client,
}

impl HttpJwksFetcher {
    /// Create a fetcher for `{endpoint}/auth/keys`
    ///
    /// # Errors
    ///
    /// Returns an input error when the endpoint is neither HTTPS nor a
    /// loopback HTTP address.
    pub fn new(endpoint: &Url, http_client: reqwest::Client) -> Result<Self> {
        let keys_url = endpoint_path(endpoint, KEYS_PATH)?;
        require_secure(&keys_url)?;
        Ok(Self {
            keys_url,
            http_client,
        })
    }

    /// The key set URL
    pub fn keys_url(&self) -> &Url {
        &self.keys_url
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch_keys(&self) -> Result<Vec<AppleJwk>> {
        info!(jwks_uri = %self.keys_url, "Fetching Apple public keys");

        let response = self
            .http_client
            .get(self.keys_url.clone())
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.keys_url, error = %e, "Failed to fetch Apple keys");
                AppleIdError::fetch(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.keys_url,
                status = %response.status(),
                "Apple keys endpoint returned error status"
            );
            return Err(AppleIdError::fetch(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.keys_url, error = %e, "Apple keys response is not JSON");
            AppleIdError::fetch(format!("JWKS response is not JSON: {e}"))
        })?;

        let keys = parse_key_set(body)?;
        info!(
            jwks_uri = %self.keys_url,
            key_count = keys.len(),
            "Successfully fetched Apple public keys"
        );
        Ok(keys)
    }
}

/// Extract the key records from a key set document
///
/// # Errors
///
/// Returns a format error when `keys` is absent, not an array, or holds a
/// record without string `kid`/`n`/`e` fields.
pub fn parse_key_set(document: Value) -> Result<Vec<AppleJwk>> {
    let Value::Object(mut object) = document else {
        return Err(AppleIdError::format("JWKS document is not a JSON object"));
    };

    let keys = match object.remove("keys") {
        Some(keys @ Value::Array(_)) => keys,
        Some(_) => return Err(AppleIdError::format("JWKS 'keys' field is not an array")),
        None => return Err(AppleIdError::format("JWKS document has no 'keys' field")),
    };

    serde_json::from_value(keys)
        .map_err(|e| AppleIdError::format(format!("Invalid JWKS key record: {e}")))
}
