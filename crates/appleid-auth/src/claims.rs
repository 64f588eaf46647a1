//! Claims carried by Apple identity tokens
//!
//! Apple encodes some booleans as JSON booleans and others as the strings
//! `"true"` / `"false"` depending on platform and token age; both decode to
//! `bool` here.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

/// Decoded identity token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppleIdTokenClaims {
    /// Issuer, `https://appleid.apple.com`
    pub iss: String,

    /// Stable user identifier, unique per developer team
    pub sub: String,

    /// Client IDs (bundle ID or Services ID) the token was issued for
    ///
    /// Apple sends a single string; an array is accepted as well.
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,

    /// Expiration time (Unix seconds)
    pub exp: u64,

    /// Issued at (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Nonce passed in the authorization request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Whether the platform supports nonces
    #[serde(
        default,
        deserialize_with = "bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub nonce_supported: Option<bool>,

    /// The user's email, real or private relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether Apple verified the email
    #[serde(
        default,
        deserialize_with = "bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email_verified: Option<bool>,

    /// Whether the email is a private relay address
    #[serde(
        default,
        deserialize_with = "bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_private_email: Option<bool>,

    /// Real-person likelihood (iOS 14+, not sent for web)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_user_status: Option<RealUserStatus>,

    /// Time of user authentication (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<u64>,

    /// Access token hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Authorization code hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    /// Identifier used while transferring an app between teams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_sub: Option<String>,

    /// Claims not modeled above
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// Apple's assessment of whether the user is a real person
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RealUserStatus {
    /// Not supported on this platform
    Unsupported,
    /// Not enough signal
    Unknown,
    /// Very likely a real person
    LikelyReal,
}

impl TryFrom<u8> for RealUserStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unsupported),
            1 => Ok(Self::Unknown),
            2 => Ok(Self::LikelyReal),
            other => Err(format!("unknown real_user_status {other}")),
        }
    }
}

impl From<RealUserStatus> for u8 {
    fn from(status: RealUserStatus) -> Self {
        match status {
            RealUserStatus::Unsupported => 0,
            RealUserStatus::Unknown => 1,
            RealUserStatus::LikelyReal => 2,
        }
    }
}

fn bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Str(String),
    }

    Ok(match Option::<Flexible>::deserialize(deserializer)? {
        None => None,
        Some(Flexible::Bool(value)) => Some(value),
        Some(Flexible::Str(value)) if value.eq_ignore_ascii_case("true") => Some(true),
        Some(Flexible::Str(value)) if value.eq_ignore_ascii_case("false") => Some(false),
        Some(Flexible::Str(value)) => {
            return Err(de::Error::invalid_value(
                de::Unexpected::Str(&value),
                &"a boolean or the string \"true\" or \"false\"",
            ));
        }
    })
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}

impl AppleIdTokenClaims {
    /// Whether `client_id` is among the token's audiences
    pub fn has_audience(&self, client_id: &str) -> bool {
        self.aud.iter().any(|aud| aud == client_id)
    }
}
