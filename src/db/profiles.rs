use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::profile::{DiscordGrant, LinkProfile, Profile, RiotAccount};

/// Read side of profile storage needed to authorize agent sessions.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_riot_id(&self, riot_id: &str) -> Result<Option<Profile>, sqlx::Error>;
}

const SELECT_PROFILES: &str = "SELECT discord_id, riot_id, riot_name, riot_tag, \
     discord_token_type, discord_access, discord_refresh, discord_issued_at, \
     discord_expires_in, created_at, updated_at FROM profiles";

fn row_to_profile(row: sqlx::sqlite::SqliteRow) -> Profile {
    let riot_id: Option<String> = row.get("riot_id");
    let riot = riot_id.map(|riot_id| RiotAccount {
        riot_id,
        riot_name: row.get::<Option<String>, _>("riot_name").unwrap_or_default(),
        riot_tag: row.get::<Option<String>, _>("riot_tag").unwrap_or_default(),
    });

    let access: Option<String> = row.get("discord_access");
    let discord = access.map(|access_token| DiscordGrant {
        token_type: row
            .get::<Option<String>, _>("discord_token_type")
            .unwrap_or_default(),
        access_token,
        refresh_token: row
            .get::<Option<String>, _>("discord_refresh")
            .unwrap_or_default(),
        issued_at: row.get::<Option<i64>, _>("discord_issued_at").unwrap_or(0),
        expires_in: row.get::<Option<i64>, _>("discord_expires_in").unwrap_or(0),
    });

    Profile {
        discord_id: row.get("discord_id"),
        riot,
        discord,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn find_by_riot_id(
    pool: &SqlitePool,
    riot_id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    let row = sqlx::query(&format!("{SELECT_PROFILES} WHERE riot_id = ?"))
        .bind(riot_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(row_to_profile))
}

pub async fn get_by_discord_id(
    pool: &SqlitePool,
    discord_id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    let row = sqlx::query(&format!("{SELECT_PROFILES} WHERE discord_id = ?"))
        .bind(discord_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(row_to_profile))
}

/// Create or update the profile for a Discord user with a freshly linked
/// Riot account. A Riot account belongs to at most one profile, so any
/// previous owner loses it.
pub async fn upsert_link(pool: &SqlitePool, input: &LinkProfile) -> Result<Profile, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE profiles SET riot_id = NULL, riot_name = NULL, riot_tag = NULL, \
         updated_at = datetime('now') WHERE riot_id = ? AND discord_id != ?",
    )
    .bind(&input.riot.riot_id)
    .bind(&input.discord_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO profiles (discord_id, riot_id, riot_name, riot_tag, discord_token_type, \
         discord_access, discord_refresh, discord_issued_at, discord_expires_in) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(discord_id) DO UPDATE SET \
         riot_id = excluded.riot_id, riot_name = excluded.riot_name, riot_tag = excluded.riot_tag, \
         discord_token_type = excluded.discord_token_type, discord_access = excluded.discord_access, \
         discord_refresh = excluded.discord_refresh, discord_issued_at = excluded.discord_issued_at, \
         discord_expires_in = excluded.discord_expires_in, updated_at = datetime('now')",
    )
    .bind(&input.discord_id)
    .bind(&input.riot.riot_id)
    .bind(&input.riot.riot_name)
    .bind(&input.riot.riot_tag)
    .bind(&input.discord.token_type)
    .bind(&input.discord.access_token)
    .bind(&input.discord.refresh_token)
    .bind(input.discord.issued_at)
    .bind(input.discord.expires_in)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_by_discord_id(pool, &input.discord_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// [`ProfileStore`] backed by the server's SQLite pool.
#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn find_by_riot_id(&self, riot_id: &str) -> Result<Option<Profile>, sqlx::Error> {
        find_by_riot_id(&self.pool, riot_id).await
    }
}
