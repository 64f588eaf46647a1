//! Identity token verification
//!
//! Verification runs in a fixed order:
//! 1. Declared algorithm checked against the accepted list (rejects `none`
//!    and symmetric algorithms before any key lookup)
//! 2. Header decoded, `kid` required
//! 3. Key looked up once through the supplied async lookup
//! 4. Signature, `iss`, `exp`, `nbf`, optional `aud`/`sub` checked by `jsonwebtoken`
//! 5. `iat` not in the future, optional `nonce` match
//!
//! Caller options override the Apple defaults field by field.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, errors::ErrorKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::claims::AppleIdTokenClaims;
use crate::config::APPLE_ISSUER;
use crate::error::{AppleIdError, Result, VerificationFailure};
use crate::keys::ApplePublicKey;
use crate::resolver::KeyResolver;

/// Algorithm Apple signs identity tokens with
pub const APPLE_ALGORITHM: Algorithm = Algorithm::RS256;

/// Per-call verification options
///
/// Unset fields fall back to Apple's defaults: `RS256` only, issuer
/// `https://appleid.apple.com`, no audience/subject/nonce check, no leeway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Accepted algorithms (asymmetric only)
    pub algorithms: Option<Vec<Algorithm>>,
    /// Accepted audiences (your client IDs)
    pub audience: Option<Vec<String>>,
    /// Expected issuer
    pub issuer: Option<String>,
    /// Expected subject
    pub subject: Option<String>,
    /// Expected nonce
    pub nonce: Option<String>,
    /// Clock skew tolerance for `exp`, `nbf` and `iat`
    pub leeway: Option<Duration>,
    /// Resolve a missing key without replacing the shared key cache
    pub disable_caching: bool,
}

impl VerifyOptions {
    /// Options with Apple's defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `aud` to be one of `audience`
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = Some(audience.into_iter().map(Into::into).collect());
        self
    }

    /// Override the expected issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require a specific subject
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Require a specific nonce
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Set clock skew tolerance
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = Some(leeway);
        self
    }

    /// Fetch unknown keys without storing them in the key cache
    pub fn without_caching(mut self) -> Self {
        self.disable_caching = true;
        self
    }

    /// Override accepted algorithms
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = Some(algorithms);
        self
    }
}

/// Verifies Apple identity tokens
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    resolver: Arc<KeyResolver>,
    issuer: String,
}

impl TokenVerifier {
    /// Create a verifier resolving keys through `resolver`
    pub fn new(resolver: Arc<KeyResolver>) -> Self {
        Self {
            resolver,
            issuer: APPLE_ISSUER.to_string(),
        }
    }

    /// Change the default expected issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Default expected issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The key resolver backing [`verify`](Self::verify)
    pub fn resolver(&self) -> &Arc<KeyResolver> {
        &self.resolver
    }

    /// Verify an identity token and decode Apple's claims
    ///
    /// # Errors
    ///
    /// Input errors for invalid options, verification errors with their
    /// reason, and key resolution errors (`KeyNotFound`, fetch, format,
    /// import) unchanged.
    pub async fn verify(&self, token: &str, options: &VerifyOptions) -> Result<AppleIdTokenClaims> {
        let resolver = &self.resolver;
        let disable_caching = options.disable_caching;
        self.verify_with(token, options, |header: &Header| {
            let kid = header.kid.clone();
            async move {
                match kid {
                    Some(kid) => resolver.resolve_with(&kid, disable_caching).await,
                    None => Err(AppleIdError::verification(
                        VerificationFailure::MissingKeyId,
                        "JWT must include kid (key ID) in header",
                    )),
                }
            }
        })
        .await
    }

    /// Verify a token with a caller-supplied key lookup
    ///
    /// `lookup` is called exactly once, after the header checks pass, and
    /// its result is awaited before the signature is checked.
    ///
    /// # Errors
    ///
    /// As [`verify`](Self::verify), plus whatever `lookup` returns.
    pub async fn verify_with<T, F, Fut>(
        &self,
        token: &str,
        options: &VerifyOptions,
        lookup: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&Header) -> Fut,
        Fut: Future<Output = Result<ApplePublicKey>>,
    {
        let algorithms = accepted_algorithms(options)?;

        // The raw name is checked first so `none` and unknown names are
        // reported as algorithm failures rather than parse failures.
        let declared = declared_algorithm(token)?;
        if !algorithms.iter().any(|alg| algorithm_name(*alg) == declared) {
            error!(
                algorithm = %declared,
                allowed = ?algorithms,
                "Identity token algorithm not allowed"
            );
            return Err(AppleIdError::verification(
                VerificationFailure::Algorithm,
                format!("Algorithm {declared} not allowed"),
            ));
        }

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode identity token header");
            AppleIdError::verification(
                VerificationFailure::Malformed,
                format!("Invalid JWT format: {e}"),
            )
        })?;

        if header.kid.is_none() {
            error!("Identity token missing kid (key ID) in header");
            return Err(AppleIdError::verification(
                VerificationFailure::MissingKeyId,
                "JWT must include kid (key ID) in header",
            ));
        }

        let key = lookup(&header).await?;
        let decoding_key = key.decoding_key()?;

        let issuer = options.issuer.as_deref().unwrap_or(&self.issuer);
        let leeway = options.leeway.unwrap_or_default().as_secs();

        let mut validation = Validation::new(header.alg);
        validation.algorithms = algorithms;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_nbf = true;
        validation.leeway = leeway;
        match &options.audience {
            Some(audience) => validation.set_audience(audience),
            None => {
                debug!("No audience configured, skipping identity token audience check");
                validation.validate_aud = false;
            }
        }
        if let Some(subject) = &options.subject {
            validation.sub = Some(subject.clone());
        }

        let token_data = decode::<Value>(token, &decoding_key, &validation).map_err(|e| {
            let reason = failure_for(e.kind());
            warn!(
                error = %e,
                reason = %reason,
                kid = key.kid(),
                issuer = issuer,
                "Identity token validation failed"
            );
            match e.kind() {
                ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                    AppleIdError::import(format!("key '{}' rejected: {e}", key.kid()))
                }
                _ => AppleIdError::verification(reason, e.to_string()),
            }
        })?;

        let claims = token_data.claims;
        check_issued_at(&claims, leeway)?;
        if let Some(expected) = &options.nonce {
            check_nonce(&claims, expected)?;
        }

        debug!(
            kid = key.kid(),
            subject = ?claims.get("sub"),
            "Identity token verification successful"
        );

        serde_json::from_value(claims).map_err(|e| {
            AppleIdError::verification(
                VerificationFailure::Claims,
                format!("Unexpected identity token claims: {e}"),
            )
        })
    }
}

fn accepted_algorithms(options: &VerifyOptions) -> Result<Vec<Algorithm>> {
    match &options.algorithms {
        None => Ok(vec![APPLE_ALGORITHM]),
        Some(algorithms) if algorithms.is_empty() => {
            Err(AppleIdError::input("at least one algorithm must be accepted"))
        }
        Some(algorithms) => {
            if let Some(symmetric) = algorithms.iter().find(|alg| is_symmetric(**alg)) {
                return Err(AppleIdError::input(format!(
                    "symmetric algorithm {symmetric:?} cannot verify Apple identity tokens"
                )));
            }
            Ok(algorithms.clone())
        }
    }
}

fn is_symmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

fn algorithm_name(algorithm: Algorithm) -> String {
    // Algorithm serializes to its JOSE name, e.g. "RS256"
    serde_json::to_value(algorithm)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{algorithm:?}"))
}

fn declared_algorithm(token: &str) -> Result<String> {
    let malformed = |detail: &str| {
        AppleIdError::verification(VerificationFailure::Malformed, detail.to_string())
    };

    let encoded_header = token
        .split('.')
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| malformed("Invalid JWT format: missing header"))?;
    let header_bytes = URL_SAFE_NO_PAD
        .decode(encoded_header)
        .map_err(|_| malformed("Invalid JWT format: header is not base64url"))?;
    let header: Value = serde_json::from_slice(&header_bytes)
        .map_err(|_| malformed("Invalid JWT format: header is not JSON"))?;

    header
        .get("alg")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AppleIdError::verification(VerificationFailure::Algorithm, "JWT header has no alg")
        })
}

fn check_issued_at(claims: &Value, leeway: u64) -> Result<()> {
    let Some(iat) = claims.get("iat").and_then(Value::as_u64) else {
        return Ok(());
    };
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    if iat > now.saturating_add(leeway) {
        return Err(AppleIdError::verification(
            VerificationFailure::Immature,
            format!("Token issued in the future (iat {iat}, now {now})"),
        ));
    }
    Ok(())
}

fn check_nonce(claims: &Value, expected: &str) -> Result<()> {
    match claims.get("nonce").and_then(Value::as_str) {
        Some(nonce) if nonce == expected => Ok(()),
        Some(_) => Err(AppleIdError::verification(
            VerificationFailure::NonceMismatch,
            "Token nonce does not match",
        )),
        None => Err(AppleIdError::verification(
            VerificationFailure::NonceMismatch,
            "Token carries no nonce",
        )),
    }
}

fn failure_for(kind: &ErrorKind) -> VerificationFailure {
    match kind {
        ErrorKind::InvalidSignature => VerificationFailure::Signature,
        ErrorKind::ExpiredSignature => VerificationFailure::Expired,
        ErrorKind::ImmatureSignature => VerificationFailure::Immature,
        ErrorKind::InvalidIssuer => VerificationFailure::Issuer,
        ErrorKind::InvalidAudience => VerificationFailure::Audience,
        ErrorKind::InvalidSubject => VerificationFailure::Subject,
        ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm => VerificationFailure::Algorithm,
        ErrorKind::MissingRequiredClaim(_) => VerificationFailure::Claims,
        _ => VerificationFailure::Malformed,
    }
}
