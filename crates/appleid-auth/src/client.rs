//! High-level client wiring the pieces together
//!
//! ```rust,no_run
//! use appleid_auth::{AppleIdClient, VerifyOptions};
//!
//! # async fn run(id_token: &str) -> appleid_auth::Result<()> {
//! let client = AppleIdClient::new()?;
//! let claims = client
//!     .verify_id_token(id_token, &VerifyOptions::new().with_audience(["com.example.web"]))
//!     .await?;
//! println!("signed in as {}", claims.sub);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::authorize::{AuthorizationUrlOptions, authorization_url_for};
use crate::cache::KeySetCache;
use crate::claims::AppleIdTokenClaims;
use crate::client_secret::{ClientSecretOptions, client_secret_for};
use crate::config::AppleIdConfig;
use crate::error::{AppleIdError, Result};
use crate::jwks::{HttpJwksFetcher, JwksFetcher};
use crate::resolver::KeyResolver;
use crate::token::{TokenEndpoint, TokenRequestOptions, TokenTypeHint};
use crate::verifier::{TokenVerifier, VerifyOptions};

/// Sign in with Apple relying-party client
#[derive(Debug, Clone)]
pub struct AppleIdClient {
    config: AppleIdConfig,
    endpoint: Url,
    verifier: TokenVerifier,
    tokens: TokenEndpoint,
}

impl AppleIdClient {
    /// Client for Apple's production endpoint using the shared key cache
    ///
    /// # Errors
    ///
    /// Returns an input error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Start building a client
    pub fn builder() -> AppleIdClientBuilder {
        AppleIdClientBuilder::default()
    }

    /// Active configuration
    pub fn config(&self) -> &AppleIdConfig {
        &self.config
    }

    /// The key cache used for verification
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        self.verifier.resolver().cache()
    }

    /// The underlying verifier
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Build the authorization URL against the configured endpoint
    ///
    /// # Errors
    ///
    /// Input errors for missing required fields.
    pub fn authorization_url(&self, options: &AuthorizationUrlOptions) -> Result<Url> {
        authorization_url_for(&self.endpoint, options)
    }

    /// Mint a client secret addressed to the configured issuer
    ///
    /// # Errors
    ///
    /// Input errors, see [`client_secret`](crate::client_secret::client_secret).
    pub fn client_secret(&self, options: &ClientSecretOptions) -> Result<String> {
        client_secret_for(&self.config.issuer, options)
    }

    /// Exchange an authorization code
    ///
    /// # Errors
    ///
    /// Input, fetch and format errors.
    pub async fn exchange_code(&self, code: &str, options: &TokenRequestOptions) -> Result<Value> {
        self.tokens.exchange_code(code, options).await
    }

    /// Refresh an access token
    ///
    /// # Errors
    ///
    /// Input, fetch and format errors.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        options: &TokenRequestOptions,
    ) -> Result<Value> {
        self.tokens.refresh_token(refresh_token, options).await
    }

    /// Revoke a token
    ///
    /// # Errors
    ///
    /// Input and fetch errors.
    pub async fn revoke_token(
        &self,
        token: &str,
        hint: TokenTypeHint,
        options: &TokenRequestOptions,
    ) -> Result<()> {
        self.tokens.revoke_token(token, hint, options).await
    }

    /// Verify an identity token
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify`].
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        options: &VerifyOptions,
    ) -> Result<AppleIdTokenClaims> {
        self.verifier.verify(id_token, options).await
    }

    /// Fetch Apple's current public keys as PEM strings
    ///
    /// Always hits the network. The cache is replaced unless
    /// `disable_caching` is set.
    ///
    /// # Errors
    ///
    /// Fetch, format and import errors.
    pub async fn apple_public_keys(&self, disable_caching: bool) -> Result<Vec<String>> {
        let keys = self.verifier.resolver().refresh(disable_caching).await?;
        Ok(keys.into_iter().map(|key| key.into_pem()).collect())
    }
}

/// Builder for [`AppleIdClient`]
#[derive(Debug, Default)]
pub struct AppleIdClientBuilder {
    config: Option<AppleIdConfig>,
    cache: Option<Arc<KeySetCache>>,
    fetcher: Option<Arc<dyn JwksFetcher>>,
    http_client: Option<reqwest::Client>,
}

impl AppleIdClientBuilder {
    /// Use `config` instead of the defaults
    pub fn with_config(mut self, config: AppleIdConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an isolated key cache instead of the process-wide one
    pub fn with_cache(mut self, cache: Arc<KeySetCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a custom key source
    pub fn with_fetcher(mut self, fetcher: Arc<dyn JwksFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use a preconfigured HTTP client
    ///
    /// The client should not follow redirects.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Input errors for an invalid or insecure endpoint, or when the default
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<AppleIdClient> {
        let config = self.config.unwrap_or_default();
        let endpoint = config.endpoint_url()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .timeout(config.http_timeout())
                .build()
                .map_err(|e| AppleIdError::input(format!("failed to build HTTP client: {e}")))?,
        };

        let fetcher: Arc<dyn JwksFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpJwksFetcher::new(&endpoint, http_client.clone())?),
        };
        let cache = self.cache.unwrap_or_else(KeySetCache::shared);

        let resolver =
            KeyResolver::new(cache, fetcher).with_max_refreshes(config.max_key_refreshes);
        let verifier = TokenVerifier::new(Arc::new(resolver)).with_issuer(config.issuer.clone());
        let tokens = TokenEndpoint::new(&endpoint, http_client)?;

        debug!(
            endpoint = %endpoint,
            issuer = %config.issuer,
            max_key_refreshes = config.max_key_refreshes,
            "Built Apple ID client"
        );

        Ok(AppleIdClient {
            config,
            endpoint,
            verifier,
            tokens,
        })
    }
}
