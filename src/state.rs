use sqlx::SqlitePool;
use std::sync::Arc;

use crate::agent::events::ClientDataFactory;
use crate::agent::verify::RiotJwksVerifier;
use crate::agent::AgentRelay;
use crate::config::Config;
use crate::db::profiles::SqliteProfileStore;
use crate::henrik::HenrikClient;
use crate::oauth::DiscordClient;

const USER_AGENT: &str = concat!("CypherNetwork/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub agent: Arc<AgentRelay>,
    pub discord: DiscordClient,
    pub henrik: HenrikClient,
}

impl AppState {
    /// Wire the production collaborators: Riot JWKS verification, SQLite
    /// profiles and the default per-session handler.
    pub fn new(config: &Config, db: SqlitePool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.session.verify_timeout)
            .build()?;

        let verifier = Arc::new(RiotJwksVerifier::new(&config.riot, http.clone()));
        let profiles = Arc::new(SqliteProfileStore::new(db.clone()));
        let agent = AgentRelay::new(
            &config.session,
            verifier,
            profiles,
            Arc::new(ClientDataFactory),
        );

        Ok(Self {
            db,
            agent: Arc::new(agent),
            discord: DiscordClient::new(config.discord.clone(), http.clone()),
            henrik: HenrikClient::new(&config.henrik, http),
        })
    }
}
