use reqwest::Client;
use serde::Deserialize;

use crate::config::DiscordConfig;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub id: String,
}

impl Connection {
    /// Split a `riotgames` connection name into `(name, tag)`.
    pub fn riot_id(&self) -> Option<(&str, &str)> {
        let (name, tag) = self.name.rsplit_once('#')?;
        (!name.is_empty() && !tag.is_empty()).then_some((name, tag))
    }
}

/// Discord OAuth2 code-grant client used for account linking.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    config: DiscordConfig,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig, client: Client) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError> {
        let scope = self.config.scopes.join(" ");
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];
        let token = self
            .client
            .post(format!("{}/oauth2/token", self.config.api_url))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await?;
        Ok(token)
    }

    pub async fn current_user(&self, access_token: &str) -> Result<DiscordUser, OAuthError> {
        let user = self
            .client
            .get(format!("{}/users/@me", self.config.api_url))
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<DiscordUser>()
            .await?;
        Ok(user)
    }

    pub async fn connections(&self, access_token: &str) -> Result<Vec<Connection>, OAuthError> {
        let connections = self
            .client
            .get(format!("{}/users/@me/connections", self.config.api_url))
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Connection>>()
            .await?;
        Ok(connections)
    }
}
