//! Twitch Helix user lookups.
//!
//! Uses an app access token from the client-credentials flow, fetched per
//! lookup. The follower endpoint needs moderator scopes that an app token
//! may not have, so a refused follow check degrades to "unknown".

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ToolError;

const SERVICE: &str = "Twitch";
const DEFAULT_AUTH_URL: &str = "https://id.twitch.tv";
const DEFAULT_API_URL: &str = "https://api.twitch.tv/helix";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub description: String,
    pub broadcaster_type: String,
    pub profile_image_url: String,
    pub account_created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelSummary>,
    /// `None` when not following or when the follow check was refused.
    pub following_since: Option<String>,
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub broadcaster_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TwitchUserLookup {
    Found(TwitchUser),
    NotFound { username: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct HelixData<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    broadcaster_type: String,
    #[serde(default)]
    profile_image_url: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct RawFollow {
    followed_at: String,
}

pub struct HelixClient {
    client_id: String,
    client_secret: String,
    /// Channel login without `#`.
    channel_login: String,
    auth_url: String,
    api_url: String,
    http: reqwest::Client,
}

impl HelixClient {
    pub fn new(client_id: &str, client_secret: &str, channel: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            channel_login: channel.trim_start_matches('#').to_lowercase(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point at different OAuth and Helix base URLs.
    pub fn with_endpoints(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn app_token(&self) -> Result<String, ToolError> {
        let resp = self
            .http
            .post(format!("{}/oauth2/token", self.auth_url))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|source| ToolError::Http { service: SERVICE, source })?;
        let token: TokenResponse = checked(resp).await?;
        Ok(token.access_token)
    }

    async fn helix<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ToolError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.api_url))
            .header("Client-Id", &self.client_id)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|source| ToolError::Http { service: SERVICE, source })?;
        let page: HelixData<T> = checked(resp).await?;
        Ok(page.data)
    }

    pub async fn lookup_user(&self, username: &str) -> Result<TwitchUserLookup, ToolError> {
        let login = username.trim().trim_start_matches('@').to_lowercase();
        let token = self.app_token().await?;

        let Some(user) = self
            .helix::<RawUser>(&token, "/users", &[("login", login.as_str())])
            .await?
            .into_iter()
            .next()
        else {
            return Ok(TwitchUserLookup::NotFound { username: login });
        };

        let channel = self
            .helix::<ChannelSummary>(&token, "/channels", &[("broadcaster_id", user.id.as_str())])
            .await?
            .into_iter()
            .next();

        let following_since = match self.follow_date(&token, &user.id).await {
            Ok(date) => date,
            Err(e) => {
                tracing::debug!(error = %e, user = %login, "Follow check unavailable");
                None
            }
        };

        Ok(TwitchUserLookup::Found(TwitchUser {
            id: user.id,
            login: user.login,
            display_name: user.display_name,
            description: user.description,
            broadcaster_type: user.broadcaster_type,
            profile_image_url: user.profile_image_url,
            account_created: user.created_at,
            channel,
            is_following: following_since.is_some(),
            following_since,
        }))
    }

    async fn follow_date(&self, token: &str, user_id: &str) -> Result<Option<String>, ToolError> {
        let Some(broadcaster) = self
            .helix::<RawUser>(token, "/users", &[("login", self.channel_login.as_str())])
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let follows = self
            .helix::<RawFollow>(
                token,
                "/channels/followers",
                &[("broadcaster_id", broadcaster.id.as_str()), ("user_id", user_id)],
            )
            .await?;
        Ok(follows.into_iter().next().map(|f| f.followed_at))
    }
}

async fn checked<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ToolError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ToolError::Api { service: SERVICE, status, body });
    }
    resp.json::<T>()
        .await
        .map_err(|source| ToolError::Http { service: SERVICE, source })
}
