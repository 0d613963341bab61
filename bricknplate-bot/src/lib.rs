//! bricknplate-bot: an LLM-backed Twitch chat bot for a Lego building stream.
//!
//! Chat lines that mention the bot and stream events (subs, resubs, raids)
//! are handed to an [`agent::Agent`], which may look up Lego sets, Twitch
//! users and local stream information before answering in chat.

pub mod agent;
pub mod bot;
pub mod config;
pub mod llm;
pub mod memory;
pub mod output;
pub mod stream_info;
pub mod tools;
