//! Tool definitions and execution for the agent.
//!
//! Lookup tools call Rebrickable and the Twitch Helix API; stream tools read
//! the in-memory [`StreamInfo`]. Every tool returns JSON text that is fed
//! back to the model. Failures become [`ToolError`]s, which the agent turns
//! into `{"error": ...}` results instead of aborting the turn.

pub mod lego;
pub mod stream;
pub mod twitch;

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::llm::ToolDef;
use crate::memory::RecentEvents;
use crate::stream_info::StreamInfo;

pub use lego::{LegoLookup, LegoSet, RebrickableClient};
pub use twitch::{HelixClient, TwitchUser, TwitchUserLookup};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("tool {0} is not available here")]
    NotOffered(String),
    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        source: serde_json::Error,
    },
    #[error("no stream information category named {0:?}")]
    UnknownCategory(String),
    #[error("request to {service} failed: {source}")]
    Http {
        service: &'static str,
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl ToolError {
    /// Text handed back to the model in place of a result.
    pub fn to_tool_output(&self) -> String {
        json!({ "error": self.to_string() }).to_string()
    }
}

#[derive(Deserialize)]
struct LegoSetArgs {
    set_num: String,
}

#[derive(Deserialize)]
struct LegoSearchArgs {
    query: String,
}

#[derive(Deserialize)]
struct TwitchUserArgs {
    username: String,
}

#[derive(Deserialize)]
struct StreamInfoArgs {
    #[serde(default)]
    category: Option<String>,
}

/// Names of the tools that only read local stream state.
pub const STREAM_TOOLS: [&str; 7] = [
    "get_current_build",
    "get_schedule",
    "get_upcoming_builds",
    "get_channel_info",
    "get_faq",
    "get_stream_info",
    "get_recent_supporters",
];

/// Everything the agent may call.
pub struct ToolSet {
    lego: RebrickableClient,
    twitch: HelixClient,
    stream: Arc<StreamInfo>,
    recent: Arc<Mutex<RecentEvents>>,
}

impl ToolSet {
    pub fn new(config: &Config, stream: Arc<StreamInfo>, recent: Arc<Mutex<RecentEvents>>) -> Self {
        Self::from_parts(
            RebrickableClient::new(&config.rebrickable_api_key, &config.rebrickable_base_url),
            HelixClient::new(&config.client_id, &config.client_secret, &config.channel),
            stream,
            recent,
        )
    }

    pub fn from_parts(
        lego: RebrickableClient,
        twitch: HelixClient,
        stream: Arc<StreamInfo>,
        recent: Arc<Mutex<RecentEvents>>,
    ) -> Self {
        Self {
            lego,
            twitch,
            stream,
            recent,
        }
    }

    /// Every tool, for chat turns.
    pub fn definitions(&self) -> Vec<ToolDef> {
        all_tools()
    }

    /// Only the stream tools, for event thank-yous.
    pub fn stream_definitions(&self) -> Vec<ToolDef> {
        all_tools()
            .into_iter()
            .filter(|t| STREAM_TOOLS.contains(&t.name.as_str()))
            .collect()
    }

    /// Execute a tool call from the model and return its JSON output.
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        tracing::info!(tool = name, %arguments, "Executing tool");
        let value = match name {
            "get_lego_set_info" => {
                let args: LegoSetArgs = parse_args(name, arguments)?;
                serde_json::to_value(self.lego.get_set(&args.set_num).await?)
            }
            "search_lego_sets" => {
                let args: LegoSearchArgs = parse_args(name, arguments)?;
                let sets = self.lego.search_sets(&args.query).await?;
                Ok(json!({ "query": args.query, "results": sets }))
            }
            "get_twitch_user_info" => {
                let args: TwitchUserArgs = parse_args(name, arguments)?;
                serde_json::to_value(self.twitch.lookup_user(&args.username).await?)
            }
            "get_current_build" => Ok(stream::current_build(&self.stream)),
            "get_schedule" => Ok(stream::schedule(&self.stream)),
            "get_upcoming_builds" => Ok(stream::upcoming_builds(&self.stream)),
            "get_channel_info" => Ok(stream::channel_info(&self.stream)),
            "get_faq" => Ok(stream::faq(&self.stream)),
            "get_stream_info" => {
                let args: StreamInfoArgs = parse_args(name, arguments)?;
                Ok(stream::stream_info(&self.stream, args.category.as_deref())?)
            }
            "get_recent_supporters" => {
                let recent = self.recent.lock().await;
                Ok(stream::recent_supporters(&recent))
            }
            _ => return Err(ToolError::UnknownTool(name.to_string())),
        };
        // Serializing our own plain data types cannot fail.
        Ok(value.unwrap_or(Value::Null).to_string())
    }
}

/// Models sometimes send an empty string for argument-less calls.
fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &str) -> Result<T, ToolError> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(raw).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

fn no_params() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn all_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "get_lego_set_info".to_string(),
            description: "Get detailed information about a specific Lego set by set number"
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["set_num"],
                "properties": {
                    "set_num": {
                        "type": "string",
                        "description": "The Lego set number (e.g. '42115-1' or '75192')"
                    }
                }
            }),
        },
        ToolDef {
            name: "search_lego_sets".to_string(),
            description: "Search for Lego sets by name or theme".to_string(),
            parameters: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query for finding Lego sets"
                    }
                }
            }),
        },
        ToolDef {
            name: "get_twitch_user_info".to_string(),
            description: "Get information about a Twitch user in the context of this channel"
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["username"],
                "properties": {
                    "username": {
                        "type": "string",
                        "description": "Twitch username to get information about"
                    }
                }
            }),
        },
        ToolDef {
            name: "get_current_build".to_string(),
            description: "Get the Lego set currently being built on stream and its progress"
                .to_string(),
            parameters: no_params(),
        },
        ToolDef {
            name: "get_schedule".to_string(),
            description: "Get the weekly stream schedule".to_string(),
            parameters: no_params(),
        },
        ToolDef {
            name: "get_upcoming_builds".to_string(),
            description: "Get the Lego sets planned for future streams".to_string(),
            parameters: no_params(),
        },
        ToolDef {
            name: "get_channel_info".to_string(),
            description: "Get the channel description and chat rules".to_string(),
            parameters: no_params(),
        },
        ToolDef {
            name: "get_faq".to_string(),
            description: "Get frequently asked questions about the stream and their answers"
                .to_string(),
            parameters: no_params(),
        },
        ToolDef {
            name: "get_stream_info".to_string(),
            description: "Get information about the stream like schedule, current build, etc."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "enum": stream::CATEGORIES,
                        "description": "The category of information to retrieve. If not specified, returns all information."
                    }
                }
            }),
        },
        ToolDef {
            name: "get_recent_supporters".to_string(),
            description: "Get the most recent subscribers and raiders of this stream".to_string(),
            parameters: no_params(),
        },
    ]
}
