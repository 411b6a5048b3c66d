use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::middleware::auth::BearerToken;
use crate::state::AppState;

/// Exchange a Riot access token for a Cypher Network agent token.
pub async fn auth(
    State(state): State<AppState>,
    BearerToken(credential): BearerToken,
) -> Result<Json<Value>, AppError> {
    let token = state.agent.authenticate(&credential).await?;
    Ok(Json(json!({ "token": token })))
}

pub async fn push(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(event): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    state.agent.push(&token, &event, &body).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn revoke(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Value>, AppError> {
    state.agent.revoke(&token)?;
    Ok(Json(json!({ "success": true })))
}
