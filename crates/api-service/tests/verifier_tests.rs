//! Token verifier and key cache tests against a mock JWKS endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use api_service::auth::{AuthError, JwksClient, JwtValidator, KeyError, KeyFetchError};
use api_test_utils::{
    jwks_json, TestTokenBuilder, JWKS_PATH, TEST_AUDIENCE, TEST_ISSUER, TEST_KEY_1, TEST_KEY_2,
};
use common::secret::SecretString;
use futures::future::join_all;
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONCURRENT_CALLERS: usize = 16;

fn validator_for(server: &MockServer) -> JwtValidator {
    let jwks_client = Arc::new(JwksClient::new(format!("{}{}", server.uri(), JWKS_PATH)));
    JwtValidator::new(
        jwks_client,
        TEST_ISSUER.to_string(),
        TEST_AUDIENCE.to_string(),
        Duration::from_secs(60),
    )
}

async fn mount_jwks(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn both_keys() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(jwks_json(&[&TEST_KEY_1, &TEST_KEY_2]))
}

fn secret(token: String) -> SecretString {
    SecretString::from(token)
}

// ============================================================================
// Pipeline properties
// ============================================================================

#[tokio::test]
async fn test_valid_token_verifies_twice_with_identical_claims() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 1).await;
    let validator = validator_for(&server);
    let token = secret(
        TestTokenBuilder::new()
            .with_claim("email", "alice@example.com")
            .build(),
    );

    let first = validator.validate(&token).await.unwrap();
    let second = validator.validate(&token).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.sub, "user123");
    assert_eq!(first.aud, vec![TEST_AUDIENCE.to_string()]);
}

#[tokio::test]
async fn test_alternate_algorithm_rejected_even_with_valid_signature() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 0).await;
    let validator = validator_for(&server);

    // Each of these carries a signature that verifies under its own header alg
    let cases = [
        (
            TestTokenBuilder::new().sign_with_algorithm(&TEST_KEY_1, Algorithm::RS384),
            "RS384",
        ),
        (
            TestTokenBuilder::new().sign_with_algorithm(&TEST_KEY_1, Algorithm::PS256),
            "PS256",
        ),
        (
            TestTokenBuilder::new().sign_hs256(TEST_KEY_1.n.as_bytes()),
            "HS256",
        ),
        (TestTokenBuilder::new().unsigned(), "none"),
    ];

    for (token, alg) in cases {
        let result = validator.validate(&secret(token)).await;
        assert_eq!(result, Err(AuthError::AlgorithmMismatch(alg.to_string())));
    }
}

#[tokio::test]
async fn test_expired_token_rejected_regardless_of_issuer_or_audience() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 1).await;
    let validator = validator_for(&server);

    let cases = [
        TestTokenBuilder::new().expires_in(-600),
        TestTokenBuilder::new()
            .expires_in(-600)
            .with_issuer("https://evil.example.com/"),
        TestTokenBuilder::new()
            .expires_in(-600)
            .with_audience("other-api")
            .without_claim("sub"),
    ];

    for builder in cases {
        let result = validator.validate(&secret(builder.build())).await;
        assert_eq!(result, Err(AuthError::Expired));
    }
}

#[tokio::test]
async fn test_expiry_within_clock_skew_is_accepted() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 1).await;
    let validator = validator_for(&server);

    let token = secret(TestTokenBuilder::new().expires_in(-30).build());

    assert!(validator.validate(&token).await.is_ok());
}

#[tokio::test]
async fn test_bad_signature_takes_precedence_over_expiry() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 1).await;
    let validator = validator_for(&server);

    // Header says k1, signed with key 2
    let token = TestTokenBuilder::new()
        .expires_in(-600)
        .with_kid("k1")
        .sign(&TEST_KEY_2);

    let result = validator.validate(&secret(token)).await;

    assert_eq!(result, Err(AuthError::BadSignature));
}

#[tokio::test]
async fn test_checks_run_in_pipeline_order() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 1).await;
    let validator = validator_for(&server);

    // Wrong issuer AND wrong audience AND no subject: issuer is reported
    let token = TestTokenBuilder::new()
        .with_issuer("https://evil.example.com/")
        .with_audience("other-api")
        .without_claim("sub")
        .build();
    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::IssuerMismatch)
    );

    // Wrong audience AND no subject: audience is reported
    let token = TestTokenBuilder::new()
        .with_audience("other-api")
        .without_claim("sub")
        .build();
    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::AudienceMismatch)
    );

    // Only the subject is wrong
    let token = TestTokenBuilder::new().with_claim("sub", "").build();
    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::MissingSubject)
    );
}

#[tokio::test]
async fn test_token_without_kid_is_malformed_and_never_fetches() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 0).await;
    let validator = validator_for(&server);

    let token = TestTokenBuilder::new().without_kid().build();

    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::MalformedToken)
    );
}

#[tokio::test]
async fn test_oversized_token_is_malformed() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 0).await;
    let validator = validator_for(&server);

    let token = TestTokenBuilder::new()
        .with_claim("padding", "x".repeat(10_000))
        .build();

    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::MalformedToken)
    );
}

// ============================================================================
// Key resolution through the verifier
// ============================================================================

#[tokio::test]
async fn test_cold_cache_fetch_failure_is_key_resolution_failure() {
    let server = MockServer::start().await;
    mount_jwks(&server, ResponseTemplate::new(500), 1).await;
    let validator = validator_for(&server);

    let token = TestTokenBuilder::new().with_kid("k-unseen").build();

    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::KeyResolutionFailed(KeyError::Fetch(
            KeyFetchError::Status(500)
        )))
    );
}

#[tokio::test]
async fn test_unknown_kid_is_key_not_found() {
    let server = MockServer::start().await;
    mount_jwks(&server, both_keys(), 1).await;
    let validator = validator_for(&server);

    let token = TestTokenBuilder::new().with_kid("k9").build();

    assert_eq!(
        validator.validate(&secret(token)).await,
        Err(AuthError::KeyResolutionFailed(KeyError::NotFound {
            kid: "k9".to_string()
        }))
    );
}

#[tokio::test]
async fn test_concurrent_cold_cache_validations_share_one_fetch() {
    let server = MockServer::start().await;
    mount_jwks(
        &server,
        both_keys().set_delay(Duration::from_millis(200)),
        1,
    )
    .await;
    let validator = Arc::new(validator_for(&server));

    // Half the callers use each key so lookups differ by kid
    let tasks = (0..CONCURRENT_CALLERS).map(|i| {
        let validator = Arc::clone(&validator);
        tokio::spawn(async move {
            let token = if i % 2 == 0 {
                TestTokenBuilder::new().build()
            } else {
                TestTokenBuilder::new().with_kid("k2").sign(&TEST_KEY_2)
            };
            validator.validate(&secret(token)).await
        })
    });

    let results = join_all(tasks).await;

    assert_eq!(results.len(), CONCURRENT_CALLERS);
    for result in results {
        let claims = result.expect("task should not panic").unwrap();
        assert_eq!(claims.sub, "user123");
    }
}

#[tokio::test]
async fn test_concurrent_cold_cache_failure_reaches_every_caller() {
    let server = MockServer::start().await;
    mount_jwks(
        &server,
        ResponseTemplate::new(503).set_delay(Duration::from_millis(200)),
        1,
    )
    .await;
    let validator = Arc::new(validator_for(&server));

    let tasks = (0..CONCURRENT_CALLERS).map(|_| {
        let validator = Arc::clone(&validator);
        tokio::spawn(async move {
            let token = TestTokenBuilder::new().build();
            validator.validate(&secret(token)).await
        })
    });

    for result in join_all(tasks).await {
        assert_eq!(
            result.expect("task should not panic"),
            Err(AuthError::KeyResolutionFailed(KeyError::Fetch(
                KeyFetchError::Status(503)
            )))
        );
    }
}

#[tokio::test]
async fn test_key_rotation_is_picked_up_for_new_kid() {
    let server = MockServer::start().await;
    // First publication has only k1
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(&[&TEST_KEY_1])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    // After rotation k2 is published
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(both_keys())
        .expect(1)
        .mount(&server)
        .await;
    let validator = validator_for(&server);

    let old = TestTokenBuilder::new().build();
    let rotated = TestTokenBuilder::new().with_kid("k2").sign(&TEST_KEY_2);

    assert!(validator.validate(&secret(old.clone())).await.is_ok());
    assert!(validator.validate(&secret(rotated)).await.is_ok());
    // k1 is still served from the refreshed set without another fetch
    assert!(validator.validate(&secret(old)).await.is_ok());
}
