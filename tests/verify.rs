mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cypherserver::agent::verify::{CredentialVerifier, RiotJwksVerifier, VerifyError};
use cypherserver::config::RiotConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

const SIGNING_KEY: &str = include_str!("fixtures/riot_signing_key.pem");
const SIGNING_KEY_N: &str = include_str!("fixtures/riot_signing_key.n");
const FOREIGN_KEY: &str = include_str!("fixtures/foreign_signing_key.pem");

#[derive(Clone)]
struct Jwks {
    fetches: Arc<AtomicUsize>,
    healthy: bool,
}

async fn jwks(State(jwks): State<Jwks>) -> Response {
    jwks.fetches.fetch_add(1, Ordering::SeqCst);
    if !jwks.healthy {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({
        "keys": [{
            "kty": "RSA",
            "kid": "s1",
            "alg": "RS256",
            "use": "sig",
            "n": SIGNING_KEY_N.trim(),
            "e": "AQAB"
        }]
    }))
    .into_response()
}

async fn verifier(healthy: bool) -> (RiotJwksVerifier, Arc<AtomicUsize>) {
    let fetches = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/jwks.json", get(jwks)).with_state(Jwks {
        fetches: Arc::clone(&fetches),
        healthy,
    });
    let base = common::spawn(app).await;
    let config = RiotConfig {
        jwks_url: format!("{base}/jwks.json"),
        jwks_refresh: Duration::from_secs(3600),
    };
    (RiotJwksVerifier::new(&config, reqwest::Client::new()), fetches)
}

fn sign(pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let header = Header {
        kid: kid.map(str::to_string),
        ..Header::new(Algorithm::RS256)
    };
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

fn claims(sub: &str, exp_offset_secs: i64) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": sub,
        "iat": now,
        "exp": now + exp_offset_secs,
        "iss": "https://auth.riotgames.com"
    })
}

#[tokio::test]
async fn test_valid_token_yields_subject() {
    let (verifier, fetches) = verifier(true).await;
    let token = sign(SIGNING_KEY, Some("s1"), &claims("U1", 600));
    assert_eq!(verifier.verify(&token).await.unwrap(), "U1");

    // keys are cached between verifications
    let token = sign(SIGNING_KEY, Some("s1"), &claims("U2", 600));
    assert_eq!(verifier.verify(&token).await.unwrap(), "U2");
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (verifier, _) = verifier(true).await;
    let token = sign(SIGNING_KEY, Some("s1"), &claims("U1", -3600));
    assert!(matches!(
        verifier.verify(&token).await,
        Err(VerifyError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_foreign_signature_is_rejected() {
    let (verifier, _) = verifier(true).await;
    let token = sign(FOREIGN_KEY, Some("s1"), &claims("U1", 600));
    assert!(matches!(
        verifier.verify(&token).await,
        Err(VerifyError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_unknown_key_id_is_rejected() {
    let (verifier, fetches) = verifier(true).await;
    let token = sign(SIGNING_KEY, Some("rotated"), &claims("U1", 600));
    assert!(matches!(
        verifier.verify(&token).await,
        Err(VerifyError::UnknownKey)
    ));
    // a fresh cache is not refetched for every unknown kid
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_subject_is_rejected() {
    let (verifier, _) = verifier(true).await;
    let now = chrono::Utc::now().timestamp();
    let token = sign(SIGNING_KEY, Some("s1"), &json!({ "exp": now + 600 }));
    assert!(verifier.verify(&token).await.is_err());
}

#[tokio::test]
async fn test_symmetric_algorithm_is_rejected() {
    let (verifier, fetches) = verifier(true).await;
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims("U1", 600),
        &EncodingKey::from_secret(b"guessable"),
    )
    .unwrap();
    assert!(matches!(
        verifier.verify(&token).await,
        Err(VerifyError::Algorithm(Algorithm::HS256))
    ));
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_garbage_is_malformed() {
    let (verifier, _) = verifier(true).await;
    assert!(matches!(
        verifier.verify("not-a-jwt").await,
        Err(VerifyError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_unavailable_jwks_fails_closed() {
    let (verifier, _) = verifier(false).await;
    let token = sign(SIGNING_KEY, Some("s1"), &claims("U1", 600));
    assert!(matches!(
        verifier.verify(&token).await,
        Err(VerifyError::Jwks(_))
    ));
}
