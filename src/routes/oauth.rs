use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db;
use crate::error::AppError;
use crate::models::profile::{DiscordGrant, LinkProfile, RiotAccount};
use crate::state::AppState;

const NO_RIOT_CONNECTION: &str = "No Riot Account connected. Try again after linking an account.";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

pub async fn invite(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.discord.config().invite_url())
}

pub async fn authorize(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.discord.config().authorize_url())
}

/// OAuth2 redirect target: resolves the user's Riot connection and stores
/// the link that later authorizes agent sessions.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<Value>, AppError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("no code specified".to_string()))?;

    let invalid_code = |e: crate::oauth::OAuthError| {
        tracing::debug!("discord oauth failed: {e}");
        AppError::Unauthorized("invalid code received".to_string())
    };

    let grant = state
        .discord
        .exchange_code(&code)
        .await
        .map_err(invalid_code)?;
    let user = state
        .discord
        .current_user(&grant.access_token)
        .await
        .map_err(invalid_code)?;
    let connections = state
        .discord
        .connections(&grant.access_token)
        .await
        .map_err(invalid_code)?;

    let (name, tag) = connections
        .iter()
        .filter(|c| c.kind == "riotgames")
        .find_map(|c| c.riot_id())
        .ok_or_else(|| AppError::Unauthorized(NO_RIOT_CONNECTION.to_string()))?;

    let account = state
        .henrik
        .get_account(name, tag)
        .await
        .map_err(|e| AppError::BadGateway(format!("account lookup for {name}#{tag}: {e}")))?;

    let link = LinkProfile {
        discord_id: user.id,
        riot: RiotAccount {
            riot_id: account.puuid,
            riot_name: account.name,
            riot_tag: account.tag,
        },
        discord: DiscordGrant {
            token_type: grant.token_type,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            issued_at: chrono::Utc::now().timestamp_millis(),
            expires_in: grant.expires_in.saturating_mul(1000),
        },
    };
    let profile = db::profiles::upsert_link(&state.db, &link).await?;
    tracing::info!(discord_id = %profile.discord_id, riot_id = %link.riot.riot_id, "riot account linked");

    Ok(Json(json!({ "profile": profile })))
}
