use std::time::Duration;

pub const DEFAULT_RIOT_JWKS_URL: &str = "https://auth.riotgames.com/jwks.json";
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_HENRIK_API_URL: &str = "https://api.henrikdev.xyz";

/// Longest idle window or lifetime a session may be configured with.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Session lifetime policy for desktop agent tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Idle window; every successful push slides the expiry by this much.
    pub idle_ttl: Duration,
    /// Hard cap measured from issuance, regardless of activity.
    pub max_lifetime: Duration,
    pub prune_interval: Duration,
    /// Upper bound for each external call made while authenticating.
    pub verify_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_lifetime: Duration::from_secs(12 * 60 * 60),
            prune_interval: Duration::from_secs(60),
            verify_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiotConfig {
    pub jwks_url: String,
    pub jwks_refresh: Duration,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_url: String,
}

impl DiscordConfig {
    /// URL users are sent to in order to link their Discord account.
    pub fn authorize_url(&self) -> String {
        format!(
            "https://discord.com/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
        )
    }

    /// URL that adds the bot to a guild.
    pub fn invite_url(&self) -> String {
        format!(
            "https://discord.com/oauth2/authorize?client_id={}&permissions=8&scope=bot%20applications.commands",
            urlencoding::encode(&self.client_id)
        )
    }
}

#[derive(Debug, Clone)]
pub struct HenrikConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub public_url: String,
    pub session: SessionConfig,
    pub riot: RiotConfig,
    pub discord: DiscordConfig,
    pub henrik: HenrikConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Clamp a session TTL to [`MAX_SESSION_TTL`], warning when `key` asked for more.
fn session_ttl(key: &str, default: Duration) -> Duration {
    let ttl = env_secs(key, default);
    if ttl > MAX_SESSION_TTL {
        tracing::warn!(
            "{key}={}s exceeds the {}s maximum; clamping",
            ttl.as_secs(),
            MAX_SESSION_TTL.as_secs()
        );
        return MAX_SESSION_TTL;
    }
    ttl
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let public_url = env_or("CYPHER_PUBLIC_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();

        let defaults = SessionConfig::default();
        let verify_timeout = std::env::var("CYPHER_VERIFY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.verify_timeout);
        let idle_ttl = session_ttl("CYPHER_SESSION_IDLE_TTL_SECS", defaults.idle_ttl);
        let max_lifetime = session_ttl("CYPHER_SESSION_MAX_LIFETIME_SECS", defaults.max_lifetime);
        let session = SessionConfig {
            idle_ttl,
            max_lifetime: max_lifetime.max(idle_ttl),
            prune_interval: env_secs("CYPHER_SESSION_PRUNE_INTERVAL_SECS", defaults.prune_interval),
            verify_timeout,
        };

        let riot = RiotConfig {
            jwks_url: env_or("RIOT_JWKS_URL", DEFAULT_RIOT_JWKS_URL),
            jwks_refresh: env_secs("RIOT_JWKS_REFRESH_SECS", Duration::from_secs(3600)),
        };

        let scopes = env_or("DISCORD_OAUTH_SCOPES", "identify connections")
            .split(|c: char| c == ' ' || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let discord = DiscordConfig {
            client_id: env_or("DISCORD_CLIENT_ID", "0"),
            client_secret: env_or("DISCORD_CLIENT_SECRET", ""),
            redirect_uri: std::env::var("DISCORD_REDIRECT_URI")
                .unwrap_or_else(|_| format!("{public_url}/oauth2")),
            scopes,
            api_url: env_or("DISCORD_API_URL", DEFAULT_DISCORD_API_URL)
                .trim_end_matches('/')
                .to_string(),
        };

        let henrik = HenrikConfig {
            api_url: env_or("HENRIK_API_URL", DEFAULT_HENRIK_API_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: env_or("HENRIK_API_KEY", ""),
        };

        Self {
            port,
            database_url: env_or("DATABASE_URL", "sqlite:cypher.db?mode=rwc"),
            public_url,
            session,
            riot,
            discord,
            henrik,
        }
    }
}
