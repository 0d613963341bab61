//! The LLM agent behind the bot.
//!
//! [`Agent`] runs a bounded tool-use loop over a [`ChatModel`]: the model may
//! ask for tools a few rounds in a row, each result is appended to the
//! conversation, and the final text becomes the chat reply. The chat side
//! only depends on the [`Responder`] trait.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{ChatModel, Message, ToolDef};
use crate::memory::ConversationMemory;
use crate::tools::{ToolError, ToolSet};

/// Posted when the model cannot produce an answer.
pub const FALLBACK_REPLY: &str =
    "Sorry, my bricks got jumbled and I couldn't answer that right now! Please try again in a moment.";

const CHAT_TOOL_ROUNDS: usize = 3;
const EVENT_TOOL_ROUNDS: usize = 2;

/// Stream events the bot thanks people for.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Subscription {
        username: String,
        tier: String,
    },
    Resub {
        username: String,
        months: u32,
        tier: String,
        message: Option<String>,
    },
    Raid {
        username: String,
        viewers: u32,
    },
}

fn tier_label(plan: &str) -> String {
    match plan {
        "Prime" => "Prime".to_string(),
        "1000" => "Tier 1".to_string(),
        "2000" => "Tier 2".to_string(),
        "3000" => "Tier 3".to_string(),
        other => format!("tier {other}"),
    }
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Subscription { .. } => "subscription",
            StreamEvent::Resub { .. } => "resub",
            StreamEvent::Raid { .. } => "raid",
        }
    }

    pub fn username(&self) -> &str {
        match self {
            StreamEvent::Subscription { username, .. }
            | StreamEvent::Resub { username, .. }
            | StreamEvent::Raid { username, .. } => username,
        }
    }

    /// What happened, in words the model can work with.
    pub fn describe(&self) -> String {
        match self {
            StreamEvent::Subscription { username, tier } => {
                format!("{username} has subscribed with {}.", tier_label(tier))
            }
            StreamEvent::Resub {
                username,
                months,
                tier,
                message,
            } => {
                let mut text = format!(
                    "{username} has resubscribed for {months} months with {}.",
                    tier_label(tier)
                );
                if let Some(msg) = message {
                    text.push_str(&format!(" Their resub message: \"{msg}\""));
                }
                text
            }
            StreamEvent::Raid { username, viewers } => {
                format!("{username} has raided the channel with {viewers} viewers.")
            }
        }
    }

    pub fn prompt(&self) -> String {
        format!(
            "{} Generate a personalized thank you message for this {} event. Make it brief, enthusiastic, and Lego-themed.",
            self.describe(),
            self.kind()
        )
    }

    /// Thank-you used when the model is unavailable.
    pub fn fallback_message(&self) -> String {
        match self {
            StreamEvent::Raid { username, viewers } => format!(
                "Thanks for the amazing raid, {username}, with {viewers} viewers! Welcome to our brick-building adventure!"
            ),
            StreamEvent::Subscription { username, .. } => format!(
                "Thanks for the sub, {username}! You're an essential piece in our community!"
            ),
            StreamEvent::Resub { username, months, .. } => format!(
                "Thanks for the {months}-month sub, {username}! You're an essential piece in our community!"
            ),
        }
    }
}

/// Turns chat lines and stream events into chat replies.
///
/// Implementations always return complete, non-empty text.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, username: &str, message: &str) -> String;
    async fn on_event(&self, event: &StreamEvent) -> String;
}

fn chat_system_prompt(bot_name: &str) -> String {
    format!(
        "You are {bot_name}, a helpful assistant for a Twitch channel focused on building Lego sets.
You have knowledge about Lego sets and can retrieve more detailed information using tools.

IMPORTANT: Your responses MUST be brief and concise, less than 400 characters. Twitch has a 500 character limit.
Be friendly, concise, and enthusiastic about Lego. The channel is currently building Lego sets live on stream.

When users ask about Lego sets:
- If they mention a specific set number (like '75192' or '42115-1'), use get_lego_set_info to look it up
- If they ask about sets with a theme or name (like 'Star Wars sets' or 'Millennium Falcon'), use search_lego_sets
- If they ask about another user, use get_twitch_user_info
- If they ask what is being built, the schedule, upcoming builds, channel rules or common questions, use get_current_build, get_schedule, get_upcoming_builds, get_channel_info or get_faq
- If they ask who subscribed or raided recently, use get_recent_supporters

If a tool reports an error or that something was not found, say so in a friendly way.
Keep your responses friendly, brief, and engaging. Feel free to use emojis and show enthusiasm about Lego.
Remember: MUST be under 400 characters."
    )
}

fn event_system_prompt(bot_name: &str) -> String {
    format!(
        "You are {bot_name}, a helpful assistant for a Twitch channel focused on building Lego sets.
Your task is to generate personalized thank-you messages for Twitch events like subscriptions and raids.

IMPORTANT: Your message MUST be under 400 characters due to Twitch's 500-character limit.

Make your messages brief, friendly, enthusiastic, and Lego-themed.

You can use the stream tools (get_current_build, get_schedule, get_upcoming_builds) to mention the current build or stream schedule.

For subscribers:
- Thank them for their support
- Mention that they're helping to \"build\" the community
- For resubscribers, acknowledge their continued support

For raiders:
- Welcome the raiders
- Mention what's currently being built
- Invite them to join the building process

Use Lego-themed language like \"building together,\" \"connecting pieces,\" \"essential building blocks,\" etc.
Remember: MUST be under 400 characters."
    )
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolSet>,
    memory: Mutex<ConversationMemory>,
    bot_name: String,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolSet>,
        bot_name: &str,
        max_history_turns: usize,
    ) -> Self {
        Self {
            model,
            tools,
            memory: Mutex::new(ConversationMemory::new(max_history_turns)),
            bot_name: bot_name.to_string(),
        }
    }

    /// Number of turns currently remembered.
    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Tool-use loop. After `max_rounds` rounds of tool calls the model is
    /// asked once more with no tools on offer, which forces a text answer.
    async fn run(&self, mut messages: Vec<Message>, tools: &[ToolDef], max_rounds: usize) -> Result<String> {
        for round in 0..=max_rounds {
            let offered: &[ToolDef] = if round < max_rounds { tools } else { &[] };
            let response = self.model.complete(&messages, offered).await?;

            let calls = response.tool_calls().to_vec();
            if calls.is_empty() || offered.is_empty() {
                return match response.text_content() {
                    Some(text) => Ok(text.to_string()),
                    None => anyhow::bail!("model returned no text"),
                };
            }

            messages.push(response);
            for call in &calls {
                let name = call.function.name.as_str();
                let result = if offered.iter().any(|t| t.name == name) {
                    self.tools.execute(name, &call.function.arguments).await
                } else {
                    Err(ToolError::NotOffered(name.to_string()))
                };
                let output = result.unwrap_or_else(|e| {
                    tracing::warn!(tool = name, error = %e, "Tool failed");
                    e.to_tool_output()
                });
                messages.push(Message::tool_result(&call.id, &output));
            }
        }
        anyhow::bail!("tool loop ended without an answer")
    }
}

#[async_trait]
impl Responder for Agent {
    async fn reply(&self, username: &str, message: &str) -> String {
        let line = format!("{username}: {message}");
        let mut messages = vec![Message::system(&chat_system_prompt(&self.bot_name))];
        messages.extend(self.memory.lock().await.to_messages());
        messages.push(Message::user(&line));

        match self.run(messages, &self.tools.definitions(), CHAT_TOOL_ROUNDS).await {
            Ok(text) => {
                self.memory.lock().await.push(line, text.clone());
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, user = username, "Agent failed; sending fallback");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn on_event(&self, event: &StreamEvent) -> String {
        let messages = vec![
            Message::system(&event_system_prompt(&self.bot_name)),
            Message::user(&event.prompt()),
        ];
        match self
            .run(messages, &self.tools.stream_definitions(), EVENT_TOOL_ROUNDS)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, kind = event.kind(), user = event.username(), "Event agent failed; sending fallback");
                event.fallback_message()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_prompts_describe_details() {
        let resub = StreamEvent::Resub {
            username: "brickfan".into(),
            months: 7,
            tier: "2000".into(),
            message: Some("love it".into()),
        };
        let prompt = resub.prompt();
        assert!(prompt.contains("brickfan has resubscribed for 7 months with Tier 2."));
        assert!(prompt.contains("\"love it\""));
        assert!(prompt.contains("resub event"));

        let raid = StreamEvent::Raid {
            username: "bigstreamer".into(),
            viewers: 42,
        };
        assert_eq!(raid.describe(), "bigstreamer has raided the channel with 42 viewers.");
    }

    #[test]
    fn fallbacks_name_the_supporter() {
        let sub = StreamEvent::Subscription {
            username: "newbie".into(),
            tier: "Prime".into(),
        };
        assert_eq!(
            sub.fallback_message(),
            "Thanks for the sub, newbie! You're an essential piece in our community!"
        );
        let resub = StreamEvent::Resub {
            username: "old".into(),
            months: 12,
            tier: "1000".into(),
            message: None,
        };
        assert!(resub.fallback_message().starts_with("Thanks for the 12-month sub, old!"));
    }

    #[test]
    fn chat_prompt_names_the_bot() {
        assert!(chat_system_prompt("BrickNPlateBot").starts_with("You are BrickNPlateBot,"));
    }
}
