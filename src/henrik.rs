use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::HenrikConfig;

#[derive(Debug, thiserror::Error)]
pub enum HenrikError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    Url(String),
    #[error("account API returned {status}")]
    Api { status: u16 },
}

/// Subset of the account lookup payload the server uses.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDetails {
    pub puuid: String,
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub account_level: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: u16,
    data: Option<T>,
}

/// Client for the community VALORANT account API.
#[derive(Clone)]
pub struct HenrikClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HenrikClient {
    pub fn new(config: &HenrikConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn account_url(&self, name: &str, tag: &str) -> Result<Url, HenrikError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| HenrikError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| HenrikError::Url(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["valorant", "v1", "account", name, tag]);
        Ok(url)
    }

    /// Look up an account by its Riot ID (`name#tag`).
    pub async fn get_account(&self, name: &str, tag: &str) -> Result<AccountDetails, HenrikError> {
        let mut request = self.client.get(self.account_url(name, tag)?);
        if !self.api_key.is_empty() {
            request = request.query(&[("api_key", self.api_key.as_str())]);
        }
        let resp = request.send().await?;

        let http_status = resp.status().as_u16();
        let envelope = resp.json::<Envelope<AccountDetails>>().await;
        match envelope {
            Ok(Envelope {
                status: 200,
                data: Some(account),
            }) => Ok(account),
            Ok(Envelope { status, .. }) => Err(HenrikError::Api { status }),
            Err(_) if http_status != 200 => Err(HenrikError::Api {
                status: http_status,
            }),
            Err(e) => Err(HenrikError::Http(e)),
        }
    }
}
