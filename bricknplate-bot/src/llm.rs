//! OpenAI chat-completions client with function-tool support.
//!
//! The agent only sees the [`ChatModel`] trait, so any backend that speaks
//! the same request/response shape (or a scripted fake in tests) can be
//! plugged in.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Result of a tool call, addressed to the call's id.
    pub fn tool_result(call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::text(Role::Tool, content)
        }
    }

    /// Tool calls requested by the model, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Non-blank text content.
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

/// Tool definition offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDef {
    fn to_wire(&self) -> serde_json::Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Something that can continue a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and the tools on offer; returns the assistant
    /// message, which may carry tool calls instead of text.
    async fn complete(&self, messages: &[Message], tools: &[ToolDef]) -> Result<Message>;
}

/// Upper bound on one completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI API client.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            model: crate::config::DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            base_url: crate::config::DEFAULT_OPENAI_BASE_URL.to_string(),
            http,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDef]) -> Result<serde_json::Value> {
        let mut body = json!({
            "model": &self.model,
            "temperature": self.temperature,
            "messages": serde_json::to_value(messages)?,
        });
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(ToolDef::to_wire).collect();
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDef]) -> Result<Message> {
        let body = self.request_body(messages, tools)?;

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {body}");
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("OpenAI response had no choices")?;
        tracing::debug!(finish_reason = ?choice.finish_reason, "Completion finished");
        Ok(choice.message)
    }
}
