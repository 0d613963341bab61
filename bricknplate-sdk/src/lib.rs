//! bricknplate-sdk: a small Twitch chat client.
//!
//! Connects to Twitch chat over TLS, logs in with a chat OAuth token,
//! decodes chat messages and subscription/raid notices into [`event::Event`]s,
//! and reconnects with backoff when the connection drops.

pub mod client;
pub mod event;
pub mod irc;
