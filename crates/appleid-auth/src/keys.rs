//! Apple signing keys: the published JWK records and their imported form
//!
//! Apple publishes RSA keys as bare modulus/exponent pairs. Each record is
//! imported into an SPKI PEM (`-----BEGIN PUBLIC KEY-----`) which is what the
//! cache stores and what the public key export hands out.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::DecodingKey;
use rsa::{
    BigUint, RsaPublicKey,
    pkcs8::{EncodePublicKey, LineEnding},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppleIdError, Result};

/// One entry of Apple's key set document (`GET /auth/keys`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppleJwk {
    /// Key ID, matched against the `kid` of identity token headers
    pub kid: String,
    /// RSA modulus (base64url)
    pub n: String,
    /// RSA public exponent (base64url)
    pub e: String,
    /// Key type, `RSA` for Apple
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    /// Intended algorithm, `RS256` for Apple
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended use, `sig` for Apple
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// An imported Apple public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplePublicKey {
    kid: String,
    pem: String,
}

impl ApplePublicKey {
    /// Wrap an existing PEM public key
    pub fn from_pem(kid: impl Into<String>, pem: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            pem: pem.into(),
        }
    }

    /// Key ID
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// SPKI PEM encoding
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Consume into the PEM string
    pub fn into_pem(self) -> String {
        self.pem
    }

    /// Build a signature verification key
    ///
    /// # Errors
    ///
    /// Returns an import error if the PEM is not an RSA public key.
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        DecodingKey::from_rsa_pem(self.pem.as_bytes()).map_err(|e| {
            AppleIdError::import(format!("key '{}' is not a usable RSA key: {e}", self.kid))
        })
    }
}

/// Import an RSA key from its modulus/exponent pair
///
/// Both the base64url alphabet Apple uses and standard base64 are accepted,
/// with or without padding.
///
/// # Errors
///
/// Returns an import error if either component is empty or not base64, or if
/// the pair is not a valid RSA public key.
pub fn import_rsa_key(jwk: &AppleJwk) -> Result<ApplePublicKey> {
    let n = decode_component(&jwk.kid, "n", &jwk.n)?;
    let e = decode_component(&jwk.kid, "e", &jwk.e)?;

    let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(|err| {
            AppleIdError::import(format!("key '{}' is not a valid RSA key: {err}", jwk.kid))
        })?;

    let pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| AppleIdError::import(format!("key '{}' failed to export: {err}", jwk.kid)))?;

    Ok(ApplePublicKey {
        kid: jwk.kid.clone(),
        pem,
    })
}

fn decode_component(kid: &str, name: &str, value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(AppleIdError::import(format!(
            "key '{kid}' has an empty '{name}' component"
        )));
    }

    let decoded = if trimmed.contains(['+', '/']) {
        STANDARD_NO_PAD.decode(trimmed)
    } else {
        URL_SAFE_NO_PAD.decode(trimmed)
    };

    decoded.map_err(|e| {
        AppleIdError::import(format!("key '{kid}' has an invalid '{name}' component: {e}"))
    })
}
