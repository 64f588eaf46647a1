//! Error types for Sign in with Apple operations
//!
//! Every public operation either succeeds or fails with exactly one
//! [`AppleIdError`] variant. Input errors are raised before any network I/O.

use std::fmt;
use thiserror::Error;

/// Result type for Sign in with Apple operations
pub type Result<T> = std::result::Result<T, AppleIdError>;

/// Errors returned by the Apple ID client and its components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppleIdError {
    /// Missing or conflicting caller input
    #[error("Invalid input: {0}")]
    Input(String),

    /// Transport failure reaching Apple (network, status, non-JSON body)
    #[error("Failed to reach Apple: {0}")]
    Fetch(String),

    /// Apple answered, but not in the expected shape
    #[error("Unexpected response format: {0}")]
    Format(String),

    /// Key material could not be turned into an RSA public key
    #[error("Invalid key material: {0}")]
    Import(String),

    /// The key ID is not among Apple's currently published keys
    #[error("Key ID '{0}' not found in Apple's published keys")]
    KeyNotFound(String),

    /// Identity token signature or claim check failed
    #[error("Identity token verification failed ({reason}): {detail}")]
    Verification {
        /// Which check failed
        reason: VerificationFailure,
        /// Human-readable detail from the failing check
        detail: String,
    },
}

/// Reason an identity token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationFailure {
    /// Token is not a well-formed JWT
    Malformed,
    /// Header carries no `kid`
    MissingKeyId,
    /// Declared algorithm is not accepted
    Algorithm,
    /// Signature does not match the resolved key
    Signature,
    /// `exp` is in the past
    Expired,
    /// `nbf` or `iat` is in the future
    Immature,
    /// `iss` does not match
    Issuer,
    /// `aud` does not match
    Audience,
    /// `sub` does not match
    Subject,
    /// `nonce` does not match
    NonceMismatch,
    /// Required claim missing or claims not in the expected shape
    Claims,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Malformed => "malformed token",
            Self::MissingKeyId => "missing key id",
            Self::Algorithm => "algorithm",
            Self::Signature => "signature",
            Self::Expired => "expired",
            Self::Immature => "not yet valid",
            Self::Issuer => "issuer",
            Self::Audience => "audience",
            Self::Subject => "subject",
            Self::NonceMismatch => "nonce",
            Self::Claims => "claims",
        };
        f.write_str(name)
    }
}

/// Coarse error category, one per [`AppleIdError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Fetch,
    Format,
    Import,
    KeyNotFound,
    Verification,
}

impl AppleIdError {
    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Create a fetch (transport) error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create a key import error
    pub fn import(message: impl Into<String>) -> Self {
        Self::Import(message.into())
    }

    /// Create a verification error with its reason
    pub fn verification(reason: VerificationFailure, detail: impl Into<String>) -> Self {
        Self::Verification {
            reason,
            detail: detail.into(),
        }
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) => ErrorKind::Input,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Format(_) => ErrorKind::Format,
            Self::Import(_) => ErrorKind::Import,
            Self::KeyNotFound(_) => ErrorKind::KeyNotFound,
            Self::Verification { .. } => ErrorKind::Verification,
        }
    }

    /// Verification reason, if this is a verification error
    pub fn verification_reason(&self) -> Option<VerificationFailure> {
        match self {
            Self::Verification { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the caller supplied bad input
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Whether the token's key was not published by Apple
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }
}
