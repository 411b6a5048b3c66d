mod agent;
mod health;
mod oauth;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(oauth::invite))
        .route("/health", get(health::health))
        .route("/authorize", get(oauth::authorize))
        .route("/oauth2", get(oauth::callback))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Desktop agent
        .route("/agent/auth", post(agent::auth))
        .route("/agent/push/{event}", post(agent::push))
        .route("/agent/session", delete(agent::revoke))
        // Version
        .route("/version", get(health::version))
}
