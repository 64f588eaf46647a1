//! Client secret (client assertion) minting
//!
//! Apple has no static client secret. Each token request carries a short-lived
//! ES256 JWT signed with the team's private key (the `.p8` file downloaded from
//! the developer portal), with the key's ID in the header.

use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::APPLE_ISSUER;
use crate::error::{AppleIdError, Result};

/// Lifetime used when the caller sets none
pub const DEFAULT_EXPIRES_AFTER: Duration = Duration::from_secs(300);

/// Longest lifetime Apple accepts (six months)
pub const MAX_EXPIRES_AFTER: Duration = Duration::from_secs(15_777_000);

/// Inputs for [`client_secret`]
#[derive(Debug, Clone, Default)]
pub struct ClientSecretOptions {
    /// Services ID or bundle ID
    pub client_id: String,
    /// Developer team ID
    pub team_id: String,
    /// ID of the private key in the developer portal
    pub key_id: String,
    /// PKCS#8 PEM private key contents
    pub private_key: Option<SecretString>,
    /// Path to the PKCS#8 PEM private key (`AuthKey_XXXX.p8`)
    pub private_key_path: Option<PathBuf>,
    /// Lifetime of the secret, 300 seconds if unset
    pub expires_after: Option<Duration>,
}

/// Claims of the client secret JWT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecretClaims {
    /// Team ID
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration (Unix seconds)
    pub exp: u64,
    /// Apple's issuer URL
    pub aud: String,
    /// Client ID
    pub sub: String,
}

/// Mint a client secret for Apple's token endpoint
///
/// # Errors
///
/// Returns an input error when a required field is empty, when both or
/// neither of `private_key` and `private_key_path` are given, when the key
/// file does not exist or the key cannot sign ES256, or when the lifetime is
/// zero or longer than six months.
pub fn client_secret(options: &ClientSecretOptions) -> Result<String> {
    client_secret_for(APPLE_ISSUER, options)
}

/// Mint a client secret addressed to a specific audience
///
/// # Errors
///
/// As [`client_secret`].
pub fn client_secret_for(audience: &str, options: &ClientSecretOptions) -> Result<String> {
    if options.client_id.trim().is_empty() {
        return Err(AppleIdError::input("client_id is empty"));
    }
    if options.team_id.trim().is_empty() {
        return Err(AppleIdError::input("team_id is empty"));
    }
    if options.key_id.trim().is_empty() {
        return Err(AppleIdError::input("key_id is empty"));
    }

    let expires_after = options.expires_after.unwrap_or(DEFAULT_EXPIRES_AFTER);
    if expires_after.as_secs() == 0 || expires_after > MAX_EXPIRES_AFTER {
        return Err(AppleIdError::input(format!(
            "expires_after must be between 1 and {} seconds",
            MAX_EXPIRES_AFTER.as_secs()
        )));
    }

    let key_pem = load_private_key(options)?;
    let encoding_key = EncodingKey::from_ec_pem(key_pem.expose_secret().as_bytes())
        .map_err(|e| AppleIdError::input(format!("private key is not a valid EC key: {e}")))?;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let claims = ClientSecretClaims {
        iss: options.team_id.clone(),
        iat: now,
        exp: now + expires_after.as_secs(),
        aud: audience.to_string(),
        sub: options.client_id.clone(),
    };

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(options.key_id.clone());

    let secret = encode(&header, &claims, &encoding_key)
        .map_err(|e| AppleIdError::input(format!("failed to sign client secret: {e}")))?;

    debug!(
        client_id = %options.client_id,
        key_id = %options.key_id,
        expires_at = claims.exp,
        "Minted Apple client secret"
    );
    Ok(secret)
}

fn load_private_key(options: &ClientSecretOptions) -> Result<SecretString> {
    match (&options.private_key, &options.private_key_path) {
        (Some(_), Some(_)) => Err(AppleIdError::input(
            "private_key and private_key_path cannot be passed together, choose one of them",
        )),
        (None, None) => Err(AppleIdError::input(
            "private_key and private_key_path are empty",
        )),
        (Some(key), None) => {
            if key.expose_secret().trim().is_empty() {
                return Err(AppleIdError::input("private_key is empty"));
            }
            Ok(key.clone())
        }
        (None, Some(path)) => {
            if !path.is_file() {
                return Err(AppleIdError::input(format!(
                    "can't find private key at {}",
                    path.display()
                )));
            }
            std::fs::read_to_string(path)
                .map(SecretString::new)
                .map_err(|e| {
                    AppleIdError::input(format!(
                        "can't read private key at {}: {e}",
                        path.display()
                    ))
                })
        }
    }
}
