//! Identity token verification against a mock Apple key endpoint

mod common;

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use appleid_auth::{
    AppleIdError, ApplePublicKey, Algorithm, Header, KeyResolver, KeySetCache, RealUserStatus,
    TokenVerifier, VerificationFailure, VerifyOptions, import_rsa_key,
};
use common::{
    APPLE_ISSUER, CLIENT_ID, CountingFetcher, MockApple, apple_claims, current_timestamp,
    hmac_token, key_a, key_b, unsigned_token,
};
use serde_json::json;

fn reason(err: AppleIdError) -> Option<VerificationFailure> {
    err.verification_reason()
}

#[tokio::test]
async fn test_valid_token_verifies() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a(), key_b()], 1).await;
    let client = apple.client();

    let token = key_a().sign(&apple_claims(3600));
    let claims = client
        .verify_id_token(&token, &VerifyOptions::new().with_audience([CLIENT_ID]))
        .await
        .unwrap();

    assert_eq!(claims.iss, APPLE_ISSUER);
    assert_eq!(claims.aud, vec![CLIENT_ID.to_string()]);
    assert!(claims.iat.is_some());
    assert_eq!(claims.sub, "001234.0f1e2d3c4b5a69788796a5b4c3d2e1f0.1234");
    assert_eq!(claims.email_verified, Some(true));
    assert_eq!(claims.is_private_email, Some(true));
    assert_eq!(claims.real_user_status, None::<RealUserStatus>);

    // Second verification is served from the cache (mock expects one fetch)
    let token = key_b().sign(&apple_claims(3600));
    client.verify_id_token(&token, &VerifyOptions::new()).await.unwrap();
    assert_eq!(client.key_cache().len(), 2);
}

#[tokio::test]
async fn test_alg_none_rejected_without_key_lookup() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 0).await;
    let client = apple.client();

    let token = unsigned_token(key_a().kid, &apple_claims(3600));
    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Algorithm));
}

#[tokio::test]
async fn test_hmac_token_rejected() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 0).await;
    let client = apple.client();

    // HMAC keyed with the public key PEM, the classic confusion attack
    let public_pem = import_rsa_key(&key_a().jwk).unwrap().into_pem();
    let token = hmac_token(key_a().kid, public_pem.as_bytes(), &apple_claims(3600));

    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Algorithm));
}

#[tokio::test]
async fn test_issuer_mismatch_rejected_and_override_accepted() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let mut claims = apple_claims(3600);
    claims["iss"] = json!("https://evil.example.com");
    let token = key_a().sign(&claims);

    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Issuer));

    let claims = client
        .verify_id_token(
            &token,
            &VerifyOptions::new().with_issuer("https://evil.example.com"),
        )
        .await
        .unwrap();
    assert_eq!(claims.iss, "https://evil.example.com");
}

#[tokio::test]
async fn test_temporal_claims() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let expired = key_a().sign(&apple_claims(-3600));
    let err = client
        .verify_id_token(&expired, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Expired));

    let mut not_yet = apple_claims(7200);
    not_yet["nbf"] = json!(current_timestamp() + 3600);
    let err = client
        .verify_id_token(&key_a().sign(&not_yet), &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Immature));

    let mut future_iat = apple_claims(7200);
    future_iat["iat"] = json!(current_timestamp() + 3600);
    let token = key_a().sign(&future_iat);
    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Immature));

    // Within leeway
    client
        .verify_id_token(
            &token,
            &VerifyOptions::new().with_leeway(Duration::from_secs(7200)),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_audience_subject_and_nonce() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let mut claims = apple_claims(3600);
    claims["nonce"] = json!("n-0S6_WzA2Mj");
    let token = key_a().sign(&claims);

    let err = client
        .verify_id_token(&token, &VerifyOptions::new().with_audience(["com.other.app"]))
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Audience));

    let accepted = VerifyOptions::new().with_audience(["com.other.app", CLIENT_ID]);
    assert!(client.verify_id_token(&token, &accepted).await.is_ok());

    let err = client
        .verify_id_token(&token, &VerifyOptions::new().with_subject("someone-else"))
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Subject));

    let err = client
        .verify_id_token(&token, &VerifyOptions::new().with_nonce("other"))
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::NonceMismatch));

    let claims = client
        .verify_id_token(&token, &VerifyOptions::new().with_nonce("n-0S6_WzA2Mj"))
        .await
        .unwrap();
    assert_eq!(claims.nonce.as_deref(), Some("n-0S6_WzA2Mj"));
}

#[tokio::test]
async fn test_signature_from_wrong_key_rejected() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a(), key_b()], 1).await;
    let client = apple.client();

    // Signed by B but claims to be A
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key_a().kid.to_string());
    let token = key_b().sign_with_header(&header, &apple_claims(3600));

    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Signature));
}

#[tokio::test]
async fn test_unknown_kid_is_key_not_found() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let token = key_b().sign(&apple_claims(3600));
    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, AppleIdError::KeyNotFound(key_b().kid.to_string()));
}

#[tokio::test]
async fn test_malformed_tokens() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 0).await;
    let client = apple.client();

    for token in ["", "not-a-token", "abc.def.ghi"] {
        let err = client
            .verify_id_token(token, &VerifyOptions::new())
            .await
            .unwrap_err();
        assert_eq!(reason(err), Some(VerificationFailure::Malformed), "token {token:?}");
    }

    let header_without_kid = Header::new(Algorithm::RS256);
    let token = key_a().sign_with_header(&header_without_kid, &apple_claims(3600));
    let err = client
        .verify_id_token(&token, &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::MissingKeyId));
}

#[tokio::test]
async fn test_claims_shape_checked_after_signature() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let mut claims = apple_claims(3600);
    claims.as_object_mut().unwrap().remove("sub");
    let err = client
        .verify_id_token(&key_a().sign(&claims), &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Claims));
}

#[tokio::test]
async fn test_audience_array_accepted() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let mut claims = apple_claims(3600);
    claims["aud"] = json!([CLIENT_ID, "com.example.ios"]);
    let token = key_a().sign(&claims);

    let verified = client
        .verify_id_token(&token, &VerifyOptions::new().with_audience([CLIENT_ID]))
        .await
        .unwrap();
    assert_eq!(verified.aud, vec![CLIENT_ID.to_string(), "com.example.ios".to_string()]);
    assert!(verified.has_audience(CLIENT_ID));

    let err = client
        .verify_id_token(&token, &VerifyOptions::new().with_audience(["com.other"]))
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Audience));
}

#[tokio::test]
async fn test_missing_iat_accepted() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let mut claims = apple_claims(3600);
    claims.as_object_mut().unwrap().remove("iat");

    let verified = client
        .verify_id_token(&key_a().sign(&claims), &VerifyOptions::new().with_audience([CLIENT_ID]))
        .await
        .unwrap();
    assert_eq!(verified.iat, None);
    assert_eq!(verified.sub, "001234.0f1e2d3c4b5a69788796a5b4c3d2e1f0.1234");
}

#[tokio::test]
async fn test_unrecognized_boolean_string_rejected() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 1).await;
    let client = apple.client();

    let mut claims = apple_claims(3600);
    claims["email_verified"] = json!("yes");

    let err = client
        .verify_id_token(&key_a().sign(&claims), &VerifyOptions::new())
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Claims));
}

#[tokio::test]
async fn test_verify_without_caching_leaves_cache_empty() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 2).await;
    let client = apple.client();

    let token = key_a().sign(&apple_claims(3600));
    let options = VerifyOptions::new().with_audience([CLIENT_ID]).without_caching();
    client.verify_id_token(&token, &options).await.unwrap();
    assert!(client.key_cache().is_empty());

    // Uncached, so the second call fetches again (mock expects two)
    client.verify_id_token(&token, &options).await.unwrap();
    assert!(client.key_cache().is_empty());
}

#[tokio::test]
async fn test_symmetric_algorithm_option_is_input_error() {
    let apple = MockApple::start().await;
    apple.mock_keys(&[key_a()], 0).await;
    let client = apple.client();

    let token = key_a().sign(&apple_claims(3600));
    let options = VerifyOptions::new().with_algorithms(vec![Algorithm::HS256]);
    let err = client.verify_id_token(&token, &options).await.unwrap_err();
    assert!(err.is_input());
}

#[tokio::test]
async fn test_verify_with_calls_lookup_once() {
    let fetcher = Arc::new(CountingFetcher::publishing(&[key_a()]));
    let resolver = KeyResolver::new(Arc::new(KeySetCache::new()), fetcher.clone());
    let verifier = TokenVerifier::new(Arc::new(resolver));

    let calls = Cell::new(0);
    let token = key_a().sign(&apple_claims(3600));
    let claims: serde_json::Value = verifier
        .verify_with(&token, &VerifyOptions::new(), |header: &Header| {
            calls.set(calls.get() + 1);
            let kid = header.kid.clone().unwrap_or_default();
            async move {
                assert_eq!(kid, key_a().kid);
                import_rsa_key(&key_a().jwk)
            }
        })
        .await
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(claims["aud"], CLIENT_ID);
    assert_eq!(fetcher.calls(), 0);

    // Rejected algorithms never reach the lookup
    let token = unsigned_token(key_a().kid, &apple_claims(3600));
    let err = verifier
        .verify_with::<serde_json::Value, _, _>(&token, &VerifyOptions::new(), |_: &Header| {
            calls.set(calls.get() + 1);
            async { Ok::<_, AppleIdError>(ApplePublicKey::from_pem("unused", "")) }
        })
        .await
        .unwrap_err();
    assert_eq!(reason(err), Some(VerificationFailure::Algorithm));
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_lookup_errors_propagate_unchanged() {
    let verifier = TokenVerifier::new(Arc::new(KeyResolver::new(
        Arc::new(KeySetCache::new()),
        Arc::new(CountingFetcher::default()),
    )));

    let token = key_a().sign(&apple_claims(3600));
    let err = verifier
        .verify_with::<serde_json::Value, _, _>(&token, &VerifyOptions::new(), |_: &Header| {
            async { Err::<ApplePublicKey, _>(AppleIdError::fetch("connection refused")) }
        })
        .await
        .unwrap_err();
    assert_eq!(err, AppleIdError::fetch("connection refused"));
}
