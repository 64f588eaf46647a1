//! Authorization URL construction
//!
//! The URL is only built here; the browser follows it. Apple requires
//! `response_mode=form_post` whenever user data (email) is requested, so
//! that mode is forced when the scope contains `email`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{APPLE_ENDPOINT, AUTHORIZE_PATH, endpoint_path};
use crate::error::{AppleIdError, Result};

/// State value used when the caller supplies none
pub const DEFAULT_STATE: &str = "state";

/// How Apple returns the authorization response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Query string of the redirect URI
    Query,
    /// Fragment of the redirect URI
    Fragment,
    /// HTML form POST to the redirect URI
    FormPost,
}

impl ResponseMode {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
            Self::FormPost => "form_post",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = AppleIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "query" => Ok(Self::Query),
            "fragment" => Ok(Self::Fragment),
            "form_post" => Ok(Self::FormPost),
            other => Err(AppleIdError::input(format!("unknown response mode '{other}'"))),
        }
    }
}

/// Parameters of the authorization request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationUrlOptions {
    /// Services ID (web) or bundle ID
    pub client_id: String,
    /// Where Apple sends the user back
    pub redirect_uri: String,
    /// Extra scopes, space separated (`openid` is always sent)
    #[serde(default)]
    pub scope: Option<String>,
    /// Opaque value echoed back by Apple
    #[serde(default)]
    pub state: Option<String>,
    /// Requested response mode, overridden to `form_post` for email scope
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

impl AuthorizationUrlOptions {
    /// Options with the two required fields
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            ..Default::default()
        }
    }

    /// Request additional scopes (e.g. `"name email"`)
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the state value
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set the response mode
    pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = Some(response_mode);
        self
    }
}

/// Build Apple's authorization URL
///
/// # Errors
///
/// Returns an input error when `client_id` or `redirect_uri` is empty.
pub fn authorization_url(options: &AuthorizationUrlOptions) -> Result<Url> {
    let endpoint = Url::parse(APPLE_ENDPOINT)
        .map_err(|e| AppleIdError::input(format!("invalid endpoint: {e}")))?;
    authorization_url_for(&endpoint, options)
}

/// Build the authorization URL against a specific endpoint
///
/// # Errors
///
/// Returns an input error when `client_id` or `redirect_uri` is empty.
pub fn authorization_url_for(endpoint: &Url, options: &AuthorizationUrlOptions) -> Result<Url> {
    if options.client_id.trim().is_empty() {
        return Err(AppleIdError::input("client_id is empty"));
    }
    if options.redirect_uri.trim().is_empty() {
        return Err(AppleIdError::input("redirect_uri is empty"));
    }

    let scope = match options.scope.as_deref().map(str::trim) {
        Some(extra) if !extra.is_empty() => format!("openid {extra}"),
        _ => "openid".to_string(),
    };
    let requests_email = scope.split_whitespace().any(|s| s == "email");

    let response_mode = if requests_email {
        Some(ResponseMode::FormPost)
    } else {
        options.response_mode
    };

    let mut url = endpoint_path(endpoint, AUTHORIZE_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("state", options.state.as_deref().unwrap_or(DEFAULT_STATE))
            .append_pair("client_id", &options.client_id)
            .append_pair("redirect_uri", &options.redirect_uri)
            .append_pair("scope", &scope);
        if let Some(mode) = response_mode {
            query.append_pair("response_mode", mode.as_str());
        }
    }

    Ok(url)
}
