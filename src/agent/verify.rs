use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RiotConfig;

/// Minimum gap between refetches triggered by an unknown `kid`.
const UNKNOWN_KID_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("no signing key matches the token")]
    UnknownKey,
    #[error("unsupported signing algorithm {0:?}")]
    Algorithm(Algorithm),
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
    #[error("token has no subject")]
    MissingSubject,
    #[error("signing keys unavailable: {0}")]
    Jwks(String),
}

/// Proves an external identity token and yields its subject.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<String, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Option<Instant>,
}

/// Verifies Riot Games access tokens against the published JWKS.
///
/// Keys are cached and refetched when older than the configured refresh
/// interval, or sooner when a token names a key id the cache lacks.
pub struct RiotJwksVerifier {
    client: Client,
    jwks_url: String,
    refresh_after: Duration,
    keys: ArcSwap<CachedKeys>,
    refresh_lock: Mutex<()>,
}

impl RiotJwksVerifier {
    pub fn new(config: &RiotConfig, client: Client) -> Self {
        Self {
            client,
            jwks_url: config.jwks_url.clone(),
            refresh_after: config.jwks_refresh,
            keys: ArcSwap::from_pointee(CachedKeys {
                set: JwkSet { keys: Vec::new() },
                fetched_at: None,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn fetch(&self) -> Result<JwkSet, VerifyError> {
        let set = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::Jwks(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::Jwks(e.to_string()))?;
        Ok(set)
    }

    fn is_stale(&self, cached: &CachedKeys, min_age: Duration) -> bool {
        match cached.fetched_at {
            None => true,
            Some(at) => at.elapsed() >= min_age,
        }
    }

    /// Refetch the key set unless another caller already did so recently.
    async fn refresh(&self, min_age: Duration) -> Result<Arc<CachedKeys>, VerifyError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.keys.load_full();
        if !self.is_stale(&current, min_age) {
            return Ok(current);
        }

        match self.fetch().await {
            Ok(set) => {
                tracing::debug!(keys = set.keys.len(), "refreshed riot signing keys");
                let fresh = Arc::new(CachedKeys {
                    set,
                    fetched_at: Some(Instant::now()),
                });
                self.keys.store(Arc::clone(&fresh));
                Ok(fresh)
            }
            // Keep serving the previous keys if we have any.
            Err(e) if current.fetched_at.is_some() => {
                tracing::warn!("riot jwks refresh failed, using cached keys: {e}");
                Ok(current)
            }
            Err(e) => Err(e),
        }
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, VerifyError> {
        let mut cached = self.keys.load_full();
        if self.is_stale(&cached, self.refresh_after) {
            cached = self.refresh(self.refresh_after).await?;
        }

        let find = |keys: &CachedKeys| match kid {
            Some(kid) => keys.set.find(kid).cloned(),
            None => keys.set.keys.first().cloned(),
        };

        let jwk = match find(cached.as_ref()) {
            Some(jwk) => jwk,
            None => {
                cached = self.refresh(UNKNOWN_KID_COOLDOWN).await?;
                find(cached.as_ref()).ok_or(VerifyError::UnknownKey)?
            }
        };

        DecodingKey::from_jwk(&jwk).map_err(|e| VerifyError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl CredentialVerifier for RiotJwksVerifier {
    async fn verify(&self, credential: &str) -> Result<String, VerifyError> {
        let header = jsonwebtoken::decode_header(credential)
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;
        if !matches!(
            header.alg,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(VerifyError::Algorithm(header.alg));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<Claims>(credential, &key, &validation)?;
        data.claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(VerifyError::MissingSubject)
    }
}
