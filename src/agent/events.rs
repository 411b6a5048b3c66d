use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use super::AgentError;

/// Game phases the desktop agent reports. Names follow the VALORANT client
/// session loop; the hyphenated forms are what the agent puts in the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PreMatch,
    InMatch,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::PreMatch, EventKind::InMatch];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PreMatch => "pre-match",
            EventKind::InMatch => "in-match",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-match" | "PREGAME" => Ok(EventKind::PreMatch),
            "in-match" | "INGAME" => Ok(EventKind::InMatch),
            other => Err(AgentError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Per-session receiver of agent events. One method per [`EventKind`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn push_pre_match(&self, body: Value) -> Result<(), HandlerError>;
    async fn push_in_match(&self, body: Value) -> Result<(), HandlerError>;
}

/// Builds the handler bound to a freshly issued session.
pub trait HandlerFactory: Send + Sync {
    fn create(&self, user_id: &str) -> Arc<dyn EventHandler>;
}

/// Route an event to the one handler method that corresponds to its kind.
pub async fn dispatch(
    kind: EventKind,
    handler: &dyn EventHandler,
    body: Value,
) -> Result<(), HandlerError> {
    match kind {
        EventKind::PreMatch => handler.push_pre_match(body).await,
        EventKind::InMatch => handler.push_in_match(body).await,
    }
}

/// Default handler: logs each event and keeps the latest payload per kind.
pub struct ClientData {
    user_id: String,
    latest: DashMap<EventKind, Value>,
}

impl ClientData {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            latest: DashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn latest(&self, kind: EventKind) -> Option<Value> {
        self.latest.get(&kind).map(|v| v.clone())
    }
}

#[async_trait]
impl EventHandler for ClientData {
    async fn push_pre_match(&self, body: Value) -> Result<(), HandlerError> {
        tracing::info!(user_id = %self.user_id, "pre-match update received");
        tracing::debug!(user_id = %self.user_id, %body, "pre-match payload");
        self.latest.insert(EventKind::PreMatch, body);
        Ok(())
    }

    async fn push_in_match(&self, body: Value) -> Result<(), HandlerError> {
        tracing::info!(user_id = %self.user_id, "in-match update received");
        tracing::debug!(user_id = %self.user_id, %body, "in-match payload");
        self.latest.insert(EventKind::InMatch, body);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClientDataFactory;

impl HandlerFactory for ClientDataFactory {
    fn create(&self, user_id: &str) -> Arc<dyn EventHandler> {
        Arc::new(ClientData::new(user_id))
    }
}
