#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use cypherserver::agent::events::{EventHandler, EventKind, HandlerError, HandlerFactory};
use cypherserver::agent::verify::{CredentialVerifier, VerifyError};
use cypherserver::agent::AgentRelay;
use cypherserver::config::{Config, DiscordConfig, HenrikConfig, RiotConfig, SessionConfig};
use cypherserver::db;
use cypherserver::db::profiles::SqliteProfileStore;
use cypherserver::henrik::HenrikClient;
use cypherserver::models::profile::{DiscordGrant, LinkProfile, Profile, RiotAccount};
use cypherserver::oauth::DiscordClient;
use cypherserver::routes;
use cypherserver::state::AppState;
use http::{Method, Request};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Verifier with a fixed credential -> subject table. `cred_ok` proves `U1`.
pub struct StaticVerifier;

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, credential: &str) -> Result<String, VerifyError> {
        match credential {
            "cred_ok" => Ok("U1".to_string()),
            "cred_unlinked" => Ok("U2".to_string()),
            _ => Err(VerifyError::Malformed("unknown test credential".to_string())),
        }
    }
}

/// One observed handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub user_id: String,
    pub kind: EventKind,
    pub body: Value,
}

/// Shared log of every handler call made by sessions of a test server.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Invocation>>,
    pub fail: bool,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

struct RecordingHandler {
    user_id: String,
    recorder: Arc<Recorder>,
}

impl RecordingHandler {
    fn record(&self, kind: EventKind, body: Value) -> Result<(), HandlerError> {
        self.recorder.calls.lock().unwrap().push(Invocation {
            user_id: self.user_id.clone(),
            kind,
            body,
        });
        if self.recorder.fail {
            return Err(HandlerError("handler exploded: /srv/secret/path".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn push_pre_match(&self, body: Value) -> Result<(), HandlerError> {
        self.record(EventKind::PreMatch, body)
    }

    async fn push_in_match(&self, body: Value) -> Result<(), HandlerError> {
        self.record(EventKind::InMatch, body)
    }
}

pub struct RecordingFactory(pub Arc<Recorder>);

impl HandlerFactory for RecordingFactory {
    fn create(&self, user_id: &str) -> Arc<dyn EventHandler> {
        Arc::new(RecordingHandler {
            user_id: user_id.to_string(),
            recorder: Arc::clone(&self.0),
        })
    }
}

/// Config pointing every upstream API at `upstream`.
pub fn test_config(upstream: &str) -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        public_url: "http://localhost:3000".to_string(),
        session: SessionConfig {
            verify_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        },
        riot: RiotConfig {
            jwks_url: format!("{upstream}/jwks.json"),
            jwks_refresh: Duration::from_secs(3600),
        },
        discord: DiscordConfig {
            client_id: "4242".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:3000/oauth2".to_string(),
            scopes: vec!["identify".to_string(), "connections".to_string()],
            api_url: format!("{upstream}/discord"),
        },
        henrik: HenrikConfig {
            api_url: format!("{upstream}/henrik"),
            api_key: "test-key".to_string(),
        },
    }
}

/// Test server over an in-memory SQLite pool. Each instance is isolated.
pub struct TestServer {
    pub state: AppState,
    pub recorder: Arc<Recorder>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::build("http://127.0.0.1:9", Recorder::default()).await
    }

    /// Server whose session handlers fail every event.
    pub async fn with_failing_handlers() -> Self {
        Self::build(
            "http://127.0.0.1:9",
            Recorder {
                fail: true,
                ..Recorder::default()
            },
        )
        .await
    }

    /// Server whose Discord and account API calls go to `upstream`.
    pub async fn with_upstream(upstream: &str) -> Self {
        Self::build(upstream, Recorder::default()).await
    }

    async fn build(upstream: &str, recorder: Recorder) -> Self {
        let config = test_config(upstream);
        let pool = db::create_pool(&config.database_url)
            .await
            .expect("failed to create test pool");

        let recorder = Arc::new(recorder);
        let agent = AgentRelay::new(
            &config.session,
            Arc::new(StaticVerifier),
            Arc::new(SqliteProfileStore::new(pool.clone())),
            Arc::new(RecordingFactory(Arc::clone(&recorder))),
        );

        let http = reqwest::Client::new();
        let state = AppState {
            db: pool,
            agent: Arc::new(agent),
            discord: DiscordClient::new(config.discord.clone(), http.clone()),
            henrik: HenrikClient::new(&config.henrik, http),
        };

        Self { state, recorder }
    }

    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    /// Store a linked profile for `riot_id` directly in the database.
    pub async fn link_profile(&self, discord_id: &str, riot_id: &str) -> Profile {
        db::profiles::upsert_link(
            self.pool(),
            &LinkProfile {
                discord_id: discord_id.to_string(),
                riot: RiotAccount {
                    riot_id: riot_id.to_string(),
                    riot_name: "Cypher".to_string(),
                    riot_tag: "0001".to_string(),
                },
                discord: DiscordGrant {
                    token_type: "Bearer".to_string(),
                    access_token: "discord-access".to_string(),
                    refresh_token: "discord-refresh".to_string(),
                    issued_at: 0,
                    expires_in: 604_800_000,
                },
            },
        )
        .await
        .expect("failed to link test profile")
    }
}

/// Spawn `app` on an ephemeral port and return its base URL.
pub async fn spawn(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", addr.port())
}

// ---------------------------------------------------------------------------
// Request builder helpers
// ---------------------------------------------------------------------------

/// Build an authenticated request with no body.
pub fn authenticated_request(method: Method, uri: &str, auth_header: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth_header)
        .body(Body::empty())
        .unwrap()
}

/// Build an authenticated request with a JSON body.
pub fn authenticated_json_request(
    method: Method,
    uri: &str,
    auth_header: &str,
    body: &Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth_header)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build an unauthenticated request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
