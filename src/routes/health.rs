use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

/// Build identity plus the number of live agent sessions.
pub async fn version(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "agent_sessions": state.agent.registry().len(),
    }))
}
