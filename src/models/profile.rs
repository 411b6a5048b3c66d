use serde::{Deserialize, Serialize};

/// Riot account linked to a Discord user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiotAccount {
    /// PUUID; also the `sub` of Riot access tokens.
    pub riot_id: String,
    pub riot_name: String,
    pub riot_tag: String,
}

/// Discord OAuth2 grant captured during linking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscordGrant {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix millis when the grant was received.
    pub issued_at: i64,
    /// Lifetime in millis.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub discord_id: String,
    pub riot: Option<RiotAccount>,
    #[serde(skip)]
    pub discord: Option<DiscordGrant>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct LinkProfile {
    pub discord_id: String,
    pub riot: RiotAccount,
    pub discord: DiscordGrant,
}
