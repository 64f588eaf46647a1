//! # appleid-auth - Sign in with Apple for relying parties
//!
//! Server-side building blocks for "Sign in with Apple": the authorization
//! URL, the ES256 client secret Apple expects in place of a static secret,
//! token exchange, refresh and revocation, and verification of Apple-issued
//! identity tokens against Apple's rotating signing keys.
//!
//! ## Architecture
//!
//! - [`keys`] - Apple JWK records and RSA public key import
//! - [`cache`] - `kid` to key map with atomic whole-set replacement
//! - [`jwks`] - Fetching Apple's key set document
//! - [`resolver`] - Key lookup with bounded refresh-on-miss
//! - [`verifier`] - Identity token signature and claim verification
//! - [`claims`] - Apple identity token claims
//! - [`authorize`] - Authorization URL construction
//! - [`client_secret`] - Client secret minting
//! - [`token`] - Token endpoint calls
//! - [`client`] - [`AppleIdClient`] facade
//!
//! ## Key rotation
//!
//! Keys are cached for the life of the process and only refreshed when a
//! token names a key ID the cache does not know. A refresh replaces the whole
//! set, so keys Apple has retired drop out on the next rotation.
//!
//! ## Quick Start
//!
//! ```rust
//! use appleid_auth::{AuthorizationUrlOptions, authorization_url};
//!
//! let url = authorization_url(
//!     &AuthorizationUrlOptions::new("com.example.web", "https://example.com/callback")
//!         .with_scope("name email"),
//! )
//! .unwrap();
//!
//! assert!(url.as_str().contains("response_mode=form_post"));
//! ```

pub mod authorize;
pub mod cache;
pub mod claims;
pub mod client;
pub mod client_secret;
pub mod config;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod resolver;
pub mod token;
pub mod verifier;

pub use authorize::{AuthorizationUrlOptions, ResponseMode, authorization_url};
pub use cache::KeySetCache;
pub use claims::{AppleIdTokenClaims, RealUserStatus};
pub use client::{AppleIdClient, AppleIdClientBuilder};
pub use client_secret::{ClientSecretClaims, ClientSecretOptions, client_secret};
pub use config::{APPLE_ENDPOINT, APPLE_ISSUER, AppleIdConfig};
pub use error::{AppleIdError, ErrorKind, Result, VerificationFailure};
pub use jwks::{HttpJwksFetcher, JwksFetcher};
pub use keys::{AppleJwk, ApplePublicKey, import_rsa_key};
pub use resolver::KeyResolver;
pub use token::{TokenEndpoint, TokenRequestOptions, TokenTypeHint};
pub use verifier::{TokenVerifier, VerifyOptions};

// Re-exported so callers can name algorithms and headers in `VerifyOptions`
// and `verify_with` lookups without a direct dependency.
pub use jsonwebtoken::{Algorithm, Header};
