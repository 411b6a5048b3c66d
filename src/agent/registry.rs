use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use data_encoding::BASE64URL_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::events::EventHandler;
use crate::config::{SessionConfig, MAX_SESSION_TTL};

/// Random bytes per session token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generate an unguessable session token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE64URL_NOPAD.encode(&bytes)
}

/// Registry key for a token. Raw tokens are never held by the registry.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_chrono(d: std::time::Duration) -> Duration {
    if d > MAX_SESSION_TTL {
        tracing::warn!(
            "session ttl of {}s exceeds the {}s maximum; clamping",
            d.as_secs(),
            MAX_SESSION_TTL.as_secs()
        );
    }
    Duration::milliseconds(d.min(MAX_SESSION_TTL).as_millis() as i64)
}

/// `at + d`, saturating at the end of the representable range.
fn saturating_add(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    at.checked_add_signed(d).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// One authenticated desktop agent connection.
pub struct Session {
    /// Identifier safe to log; the token itself never is.
    pub id: Uuid,
    user_id: String,
    handler: Arc<dyn EventHandler>,
    issued_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    expires_at_ms: AtomicI64,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn handler(&self) -> &dyn EventHandler {
        self.handler.as_ref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.expires_at_ms.load(Ordering::Acquire))
            .unwrap_or(self.issued_at)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Token -> session map for issued agent tokens.
///
/// Expiry is a sliding idle window capped by an absolute lifetime counted
/// from issuance. Expired entries are invisible to [`lookup`](Self::lookup)
/// immediately and are physically removed by [`prune_expired`](Self::prune_expired).
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    clock: Arc<dyn Clock>,
    idle_ttl: Duration,
    max_lifetime: Duration,
}

impl SessionRegistry {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let idle_ttl = to_chrono(config.idle_ttl);
        Self {
            sessions: DashMap::new(),
            clock,
            idle_ttl,
            max_lifetime: to_chrono(config.max_lifetime).max(idle_ttl),
        }
    }

    /// Register a session for `user_id` and return its bearer token.
    pub fn issue(&self, user_id: &str, handler: Arc<dyn EventHandler>) -> String {
        let now = self.clock.now();
        let deadline = saturating_add(now, self.max_lifetime);
        let expires_at = saturating_add(now, self.idle_ttl).min(deadline);

        let token = generate_token();
        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            handler,
            issued_at: now,
            deadline,
            expires_at_ms: AtomicI64::new(expires_at.timestamp_millis()),
        });

        tracing::info!(session_id = %session.id, user_id, %expires_at, "agent session issued");
        self.sessions.insert(hash_token(&token), session);
        token
    }

    /// Resolve a token to its live session. Never mutates the registry.
    pub fn lookup(&self, token: &str) -> Option<Arc<Session>> {
        let now = self.clock.now();
        self.sessions
            .get(&hash_token(token))
            .map(|entry| Arc::clone(entry.value()))
            .filter(|session| !session.is_expired(now))
    }

    /// Slide a live session's idle window forward. Returns false if the
    /// token does not resolve.
    pub fn touch(&self, token: &str) -> bool {
        let Some(session) = self.lookup(token) else {
            return false;
        };
        let now = self.clock.now();
        let expires_at = saturating_add(now, self.idle_ttl).min(session.deadline);
        session
            .expires_at_ms
            .store(expires_at.timestamp_millis(), Ordering::Release);
        true
    }

    pub fn revoke(&self, token: &str) -> bool {
        match self.sessions.remove(&hash_token(token)) {
            Some((_, session)) => {
                tracing::info!(session_id = %session.id, user_id = %session.user_id, "agent session revoked");
                true
            }
            None => false,
        }
    }

    /// Drop every expired session, returning how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
