//! Token endpoint: code exchange, refresh and revocation
//!
//! Responses are returned as raw JSON. Apple answers failed grants with a
//! JSON body such as `{"error": "invalid_grant"}` and a 400 status; that body
//! is handed back unchanged so callers see Apple's own error code.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::config::{REVOKE_PATH, TOKEN_PATH, endpoint_path, require_secure};
use crate::error::{AppleIdError, Result};

/// Client credentials sent with every token endpoint request
#[derive(Debug, Clone)]
pub struct TokenRequestOptions {
    /// Services ID or bundle ID
    pub client_id: String,
    /// Client secret minted by [`client_secret`](crate::client_secret::client_secret)
    pub client_secret: SecretString,
    /// Redirect URI used in the authorization request (code exchange only)
    pub redirect_uri: Option<String>,
}

impl TokenRequestOptions {
    /// Credentials without a redirect URI
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            redirect_uri: None,
        }
    }

    /// Set the redirect URI
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AppleIdError::input("client_id is empty"));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(AppleIdError::input("client_secret is empty"));
        }
        Ok(())
    }
}

/// Kind of token passed to revocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// An access token
    AccessToken,
    /// A refresh token
    #[default]
    RefreshToken,
}

impl TokenTypeHint {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenTypeHint {
    type Err = AppleIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "access_token" => Ok(Self::AccessToken),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(AppleIdError::input(format!("unknown token type hint '{other}'"))),
        }
    }
}

/// Apple's token and revocation endpoints
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    token_url: Url,
    revoke_url: Url,
    http_client: reqwest::Client,
}

impl TokenEndpoint {
    /// Endpoints under `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an input error when the endpoint is neither HTTPS nor a
    /// loopback HTTP address.
    pub fn new(endpoint: &Url, http_client: reqwest::Client) -> Result<Self> {
        let token_url = endpoint_path(endpoint, TOKEN_PATH)?;
        let revoke_url = endpoint_path(endpoint, REVOKE_PATH)?;
        require_secure(&token_url)?;
        Ok(Self {
            token_url,
            revoke_url,
            http_client,
        })
    }

    /// Token URL
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Revocation URL
    pub fn revoke_url(&self) -> &Url {
        &self.revoke_url
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// Input errors for empty arguments, fetch errors when Apple cannot be
    /// reached, format errors when the response is not JSON.
    pub async fn exchange_code(&self, code: &str, options: &TokenRequestOptions) -> Result<Value> {
        options.validate()?;
        if code.trim().is_empty() {
            return Err(AppleIdError::input("authorization code is empty"));
        }

        let mut form = vec![
            ("client_id", options.client_id.as_str()),
            ("client_secret", options.client_secret.expose_secret().as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        if let Some(redirect_uri) = &options.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }

        self.post_for_json("authorization_code", &form).await
    }

    /// Obtain a new access token with a refresh token
    ///
    /// # Errors
    ///
    /// As [`exchange_code`](Self::exchange_code).
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        options: &TokenRequestOptions,
    ) -> Result<Value> {
        options.validate()?;
        if refresh_token.trim().is_empty() {
            return Err(AppleIdError::input("refresh token is empty"));
        }

        let form = [
            ("client_id", options.client_id.as_str()),
            ("client_secret", options.client_secret.expose_secret().as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        self.post_for_json("refresh_token", &form).await
    }

    /// Revoke an access or refresh token
    ///
    /// # Errors
    ///
    /// Input errors for empty arguments, fetch errors when Apple cannot be
    /// reached or answers with a non-success status.
    pub async fn revoke_token(
        &self,
        token: &str,
        hint: TokenTypeHint,
        options: &TokenRequestOptions,
    ) -> Result<()> {
        options.validate()?;
        if token.trim().is_empty() {
            return Err(AppleIdError::input("token is empty"));
        }

        let form = [
            ("client_id", options.client_id.as_str()),
            ("client_secret", options.client_secret.expose_secret().as_str()),
            ("token", token),
            ("token_type_hint", hint.as_str()),
        ];

        let response = self
            .http_client
            .post(self.revoke_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.revoke_url, error = %e, "Token revocation request failed");
                AppleIdError::fetch(format!("revocation request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url = %self.revoke_url, status = %status, "Apple rejected token revocation");
            return Err(AppleIdError::fetch(format!(
                "revocation endpoint returned status {status}: {body}"
            )));
        }

        info!(client_id = %options.client_id, hint = %hint, "Revoked Apple token");
        Ok(())
    }

    async fn post_for_json(&self, grant_type: &str, form: &[(&str, &str)]) -> Result<Value> {
        debug!(url = %self.token_url, grant_type = grant_type, "Calling Apple token endpoint");

        let response = self
            .http_client
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.token_url, error = %e, "Token request failed");
                AppleIdError::fetch(format!("token request failed: {e}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppleIdError::fetch(format!("failed to read token response: {e}")))?;

        let json: Value = serde_json::from_str(&body).map_err(|e| {
            error!(url = %self.token_url, status = %status, "Token response is not JSON");
            AppleIdError::format(format!("token response is not JSON: {e}"))
        })?;

        if status.is_success() {
            debug!(grant_type = grant_type, "Apple token request succeeded");
        } else {
            debug!(
                grant_type = grant_type,
                status = %status,
                error = ?json.get("error"),
                "Apple token endpoint returned an error body"
            );
        }
        Ok(json)
    }
}
