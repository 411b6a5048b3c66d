use std::sync::Arc;
use tokio::net::TcpListener;

use cypherserver::agent::AgentRelay;
use cypherserver::config::Config;
use cypherserver::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cypherserver=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = cypherserver::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let state = AppState::new(&config, db).expect("failed to build HTTP client");

    spawn_session_reaper(Arc::clone(&state.agent), config.session.prune_interval);

    let app = cypherserver::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mcypher network\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mpublic url\x1b[0m   {}", config.public_url);
    eprintln!(
        "  \x1b[2msessions\x1b[0m     idle {}s, max {}s",
        config.session.idle_ttl.as_secs(),
        config.session.max_lifetime.as_secs()
    );

    if config.discord.client_secret.is_empty() {
        eprintln!();
        eprintln!("  \x1b[33m! DISCORD_CLIENT_SECRET not set, account linking will fail\x1b[0m");
    }

    eprintln!();
}

fn spawn_session_reaper(agent: Arc<AgentRelay>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let pruned = agent.registry().prune_expired();
            if pruned > 0 {
                tracing::info!(
                    "pruned {pruned} expired agent session(s), {} active",
                    agent.registry().len()
                );
            }
        }
    });
}
