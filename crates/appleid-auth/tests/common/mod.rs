//! Common test utilities for integration tests
//!
//! A wiremock stand-in for `appleid.apple.com`, RSA signing keys published as
//! Apple-style JWKs, and an identity token signer.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use appleid_auth::{AppleIdClient, AppleIdConfig, AppleJwk, JwksFetcher, KeySetCache};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use once_cell::sync::Lazy;
use rsa::{RsaPrivateKey, pkcs8::EncodePrivateKey, pkcs8::LineEnding, traits::PublicKeyParts};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const CLIENT_ID: &str = "com.example.web";
pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

/// An RSA signing key and its Apple-style JWK
pub struct TestKey {
    pub kid: &'static str,
    pub private_pem: String,
    pub jwk: AppleJwk,
}

impl TestKey {
    fn generate(kid: &'static str) -> Self {
        let private_key =
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate RSA key");
        let public_key = private_key.to_public_key();
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key")
            .to_string();

        Self {
            kid,
            private_pem,
            jwk: AppleJwk {
                kid: kid.to_string(),
                n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
                kty: Some("RSA".to_string()),
                alg: Some("RS256".to_string()),
                key_use: Some("sig".to_string()),
            },
        }
    }

    /// JWK as served by Apple
    pub fn jwk_json(&self) -> Value {
        serde_json::to_value(&self.jwk).expect("JWK serializes")
    }

    /// Sign `claims` as an Apple identity token with this key's `kid`
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.to_string());
        self.sign_with_header(&header, claims)
    }

    /// Sign with an explicit header
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        let key = EncodingKey::from_rsa_pem(self.private_pem.as_bytes()).expect("Invalid RSA key");
        encode(header, claims, &key).expect("Failed to encode test JWT")
    }
}

// RSA generation is slow, so each test binary generates its keys once.
static KEY_A: Lazy<TestKey> = Lazy::new(|| TestKey::generate("W6WcOKB"));
static KEY_B: Lazy<TestKey> = Lazy::new(|| TestKey::generate("fh6Bs8C"));

/// First published signing key
pub fn key_a() -> &'static TestKey {
    &KEY_A
}

/// Second published signing key
pub fn key_b() -> &'static TestKey {
    &KEY_B
}

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Identity token claims the way Apple issues them for a web sign-in
pub fn apple_claims(exp_offset_secs: i64) -> Value {
    let now = current_timestamp();
    json!({
        "iss": APPLE_ISSUER,
        "aud": CLIENT_ID,
        "exp": (now as i64 + exp_offset_secs) as u64,
        "iat": now,
        "sub": "001234.0f1e2d3c4b5a69788796a5b4c3d2e1f0.1234",
        "c_hash": "kLgQnYqFJpC3xHJm4NHZ7g",
        "email": "abc123@privaterelay.appleid.com",
        "email_verified": "true",
        "is_private_email": "true",
        "auth_time": now,
        "nonce_supported": true
    })
}

/// Token with `alg: none` and an empty signature
pub fn unsigned_token(kid: &str, claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "none", "kid": kid }).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

/// Token signed with HMAC, as in an algorithm confusion attempt
pub fn hmac_token(kid: &str, secret: &[u8], claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("Failed to encode HS256 JWT")
}

/// Mock Apple identity service
pub struct MockApple {
    pub server: MockServer,
}

impl MockApple {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, usable as the client endpoint
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Serve `keys` from `/auth/keys`, expecting exactly `expected_calls` requests
    pub async fn mock_keys(&self, keys: &[&TestKey], expected_calls: u64) {
        let keys: Vec<Value> = keys.iter().map(|key| key.jwk_json()).collect();
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary response from `/auth/keys`
    pub async fn mock_keys_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Client against this server with its own key cache
    pub fn client(&self) -> AppleIdClient {
        AppleIdClient::builder()
            .with_config(AppleIdConfig {
                endpoint: self.uri(),
                ..Default::default()
            })
            .with_cache(Arc::new(KeySetCache::new()))
            .build()
            .expect("Failed to build client")
    }
}

/// In-memory key source that counts fetches
#[derive(Debug, Default)]
pub struct CountingFetcher {
    keys: Mutex<Vec<AppleJwk>>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn publishing(keys: &[&TestKey]) -> Self {
        let fetcher = Self::default();
        fetcher.publish(keys);
        fetcher
    }

    /// Change the published key set (key rotation)
    pub fn publish(&self, keys: &[&TestKey]) {
        self.publish_records(keys.iter().map(|key| key.jwk.clone()).collect());
    }

    pub fn publish_records(&self, records: Vec<AppleJwk>) {
        *self.keys.lock().expect("lock poisoned") = records;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for CountingFetcher {
    async fn fetch_keys(&self) -> appleid_auth::Result<Vec<AppleJwk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.lock().expect("lock poisoned").clone())
    }
}
