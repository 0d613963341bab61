//! Process configuration read from the environment.
//!
//! Built once at startup and passed to every component. Tests construct it
//! through [`Config::from_lookup`] so they never touch the real environment.

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REBRICKABLE_BASE_URL: &str = "https://rebrickable.com/api/v3";
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 10;

/// Variables that must be present for the bot to start.
pub const REQUIRED_VARS: [&str; 8] = [
    "OPENAI_API_KEY",
    "REBRICKABLE_API_KEY",
    "TWITCH_BOT_USERNAME",
    "TWITCH_OAUTH_TOKEN",
    "TWITCH_CHANNEL",
    "TWITCH_CLIENT_ID",
    "TWITCH_CLIENT_SECRET",
    "STREAM_INFO_FILE",
];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub openai_base_url: String,
    pub rebrickable_api_key: String,
    pub rebrickable_base_url: String,
    pub bot_username: String,
    pub oauth_token: String,
    /// Normalized to `#lowercase`.
    pub channel: String,
    pub client_id: String,
    pub client_secret: String,
    pub stream_info_file: PathBuf,
    pub irc_server: String,
    /// Lowercased substring that makes the bot answer.
    pub trigger: String,
    pub max_history_turns: usize,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| -> Option<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let openai_api_key = require("OPENAI_API_KEY")?;
        let rebrickable_api_key = require("REBRICKABLE_API_KEY")?;
        let bot_username = require("TWITCH_BOT_USERNAME")?;
        let oauth_token = require("TWITCH_OAUTH_TOKEN")?;
        let channel = normalize_channel(&require("TWITCH_CHANNEL")?);
        let client_id = require("TWITCH_CLIENT_ID")?;
        let client_secret = require("TWITCH_CLIENT_SECRET")?;
        let stream_info_file = PathBuf::from(require("STREAM_INFO_FILE")?);

        let openai_temperature = match get("OPENAI_TEMPERATURE") {
            Some(raw) => parse_temperature(&raw)?,
            None => 0.7,
        };
        let max_history_turns = match get("MAX_HISTORY_TURNS") {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                name: "MAX_HISTORY_TURNS",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_HISTORY_TURNS,
        };
        let trigger = get("BOT_TRIGGER")
            .unwrap_or_else(|| bot_username.clone())
            .to_lowercase();

        Ok(Self {
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_temperature,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            rebrickable_api_key,
            rebrickable_base_url: get("REBRICKABLE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_REBRICKABLE_BASE_URL.to_string()),
            bot_username,
            oauth_token,
            channel,
            client_id,
            client_secret,
            stream_info_file,
            irc_server: get("TWITCH_IRC_SERVER")
                .unwrap_or_else(|| bricknplate_sdk::client::TWITCH_IRC_ADDR.to_string()),
            trigger,
            max_history_turns,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const HIDDEN: &str = "<redacted>";
        f.debug_struct("Config")
            .field("openai_api_key", &HIDDEN)
            .field("openai_model", &self.openai_model)
            .field("openai_temperature", &self.openai_temperature)
            .field("openai_base_url", &self.openai_base_url)
            .field("rebrickable_api_key", &HIDDEN)
            .field("rebrickable_base_url", &self.rebrickable_base_url)
            .field("bot_username", &self.bot_username)
            .field("oauth_token", &HIDDEN)
            .field("channel", &self.channel)
            .field("client_id", &self.client_id)
            .field("client_secret", &HIDDEN)
            .field("stream_info_file", &self.stream_info_file)
            .field("irc_server", &self.irc_server)
            .field("trigger", &self.trigger)
            .field("max_history_turns", &self.max_history_turns)
            .finish()
    }
}

fn normalize_channel(raw: &str) -> String {
    format!("#{}", raw.trim_start_matches('#').to_lowercase())
}

fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "OPENAI_TEMPERATURE",
        value: raw.to_string(),
        reason,
    };
    let t: f32 = raw.parse().map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?;
    if !(0.0..=2.0).contains(&t) {
        return Err(invalid("must be between 0 and 2".to_string()));
    }
    Ok(t)
}
