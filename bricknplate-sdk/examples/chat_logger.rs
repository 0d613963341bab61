//! Chat logger example: joins a channel and logs chat, subs and raids.
//!
//! Usage:
//!   TWITCH_CHANNEL=somechannel cargo run --example chat_logger
//!
//! Without `TWITCH_BOT_USERNAME`/`TWITCH_OAUTH_TOKEN` it connects as an
//! anonymous read-only `justinfan` user.

use anyhow::Result;
use bricknplate_sdk::client::{self, ConnectConfig, ReconnectConfig};
use bricknplate_sdk::event::Event;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let channel = std::env::var("TWITCH_CHANNEL")
        .map(|c| format!("#{}", c.trim_start_matches('#').to_lowercase()))?;
    let config = match (
        std::env::var("TWITCH_BOT_USERNAME"),
        std::env::var("TWITCH_OAUTH_TOKEN"),
    ) {
        (Ok(nick), Ok(token)) => ConnectConfig {
            nick: nick.to_lowercase(),
            oauth_token: token,
            ..Default::default()
        },
        _ => ConnectConfig {
            oauth_token: "anonymous".to_string(),
            ..Default::default()
        },
    };
    let reconnect = ReconnectConfig {
        channels: vec![channel],
        ..Default::default()
    };

    client::run_with_reconnect(config, reconnect, |_handle, event| {
        Box::pin(async move {
            match event {
                Event::Message { from, target, text, .. } => {
                    tracing::info!("[{target}] <{from}> {text}");
                }
                Event::Subscription { user, kind, plan, months, .. } => {
                    tracing::info!(%user, ?kind, %plan, ?months, "Subscription");
                }
                Event::Raid { raider, viewers, .. } => {
                    tracing::info!(%raider, viewers, "Raid");
                }
                Event::Disconnected { reason } => tracing::warn!(%reason, "Disconnected"),
                _ => {}
            }
            Ok(())
        })
    })
    .await
}
