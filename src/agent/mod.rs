//! Session bridge for the Cypher desktop agent.
//!
//! The agent proves its Riot identity once at `/agent/auth` and receives an
//! opaque session token. Later pushes carry only that token, so the JWT and
//! profile checks are paid once per session instead of once per event.
//!
//! ```text
//! auth:  credential -> verify (JWKS) -> profile lookup -> issue token
//! push:  token -> lookup session -> parse EventKind -> handler method
//! ```

pub mod clock;
pub mod events;
pub mod registry;
pub mod verify;

use std::sync::Arc;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::db::profiles::ProfileStore;
use events::{EventKind, HandlerFactory};
use registry::SessionRegistry;
use verify::CredentialVerifier;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("no credential specified")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("no linked profile; link your account with /authorize first")]
    ProfileNotFound,
    #[error("no token specified")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("unknown event kind `{0}`")]
    UnknownEvent(String),
    #[error("invalid event body: {0}")]
    InvalidBody(String),
    #[error("{kind} handler failed: {reason}")]
    DispatchFailed { kind: EventKind, reason: String },
    #[error("profile store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Verify-then-authorize token issuance plus event dispatch for issued
/// sessions.
pub struct AgentRelay {
    registry: SessionRegistry,
    verifier: Arc<dyn CredentialVerifier>,
    profiles: Arc<dyn ProfileStore>,
    handlers: Arc<dyn HandlerFactory>,
    verify_timeout: Duration,
}

impl AgentRelay {
    pub fn new(
        config: &SessionConfig,
        verifier: Arc<dyn CredentialVerifier>,
        profiles: Arc<dyn ProfileStore>,
        handlers: Arc<dyn HandlerFactory>,
    ) -> Self {
        Self::with_registry(
            SessionRegistry::new(config),
            config.verify_timeout,
            verifier,
            profiles,
            handlers,
        )
    }

    pub fn with_registry(
        registry: SessionRegistry,
        verify_timeout: Duration,
        verifier: Arc<dyn CredentialVerifier>,
        profiles: Arc<dyn ProfileStore>,
        handlers: Arc<dyn HandlerFactory>,
    ) -> Self {
        Self {
            registry,
            verifier,
            profiles,
            handlers,
            verify_timeout,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Exchange an external credential for a session token.
    ///
    /// Nothing is registered unless both the signature check and the
    /// profile lookup complete successfully.
    pub async fn authenticate(&self, credential: &str) -> Result<String, AgentError> {
        if credential.is_empty() {
            return Err(AgentError::MissingCredential);
        }

        let subject = match tokio::time::timeout(
            self.verify_timeout,
            self.verifier.verify(credential),
        )
        .await
        {
            Ok(Ok(subject)) => subject,
            Ok(Err(e)) => {
                tracing::debug!("agent credential rejected: {e}");
                return Err(AgentError::InvalidCredential);
            }
            Err(_) => {
                tracing::warn!(
                    "agent credential verification timed out after {:?}",
                    self.verify_timeout
                );
                return Err(AgentError::InvalidCredential);
            }
        };

        let profile = match tokio::time::timeout(
            self.verify_timeout,
            self.profiles.find_by_riot_id(&subject),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(user_id = %subject, "profile lookup timed out");
                None
            }
        };
        if profile.is_none() {
            return Err(AgentError::ProfileNotFound);
        }

        let handler = self.handlers.create(&subject);
        Ok(self.registry.issue(&subject, handler))
    }

    /// Dispatch one pushed event to the session behind `token`.
    pub async fn push(&self, token: &str, event: &str, body: &[u8]) -> Result<EventKind, AgentError> {
        if token.is_empty() {
            return Err(AgentError::MissingToken);
        }
        let session = self.registry.lookup(token).ok_or(AgentError::InvalidToken)?;
        let kind: EventKind = event.parse()?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AgentError::InvalidBody("missing body".to_string()));
        }
        let body: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| AgentError::InvalidBody(e.to_string()))?;

        if let Err(e) = events::dispatch(kind, session.handler(), body).await {
            tracing::warn!(session_id = %session.id, user_id = session.user_id(), %kind, "event handler failed");
            return Err(AgentError::DispatchFailed {
                kind,
                reason: e.to_string(),
            });
        }

        self.registry.touch(token);
        Ok(kind)
    }

    /// End a session early.
    pub fn revoke(&self, token: &str) -> Result<(), AgentError> {
        if token.is_empty() {
            return Err(AgentError::MissingToken);
        }
        if self.registry.revoke(token) {
            Ok(())
        } else {
            Err(AgentError::InvalidToken)
        }
    }
}
