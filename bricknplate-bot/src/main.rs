//! bricknplate-bot: Twitch chat bot for a Lego building stream.
//!
//! Configured entirely through environment variables (a `.env` file in the
//! working directory is honoured). Required:
//!
//!   OPENAI_API_KEY, REBRICKABLE_API_KEY, TWITCH_BOT_USERNAME,
//!   TWITCH_OAUTH_TOKEN, TWITCH_CHANNEL, TWITCH_CLIENT_ID,
//!   TWITCH_CLIENT_SECRET, STREAM_INFO_FILE
//!
//! Log verbosity follows RUST_LOG.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use bricknplate_bot::agent::Agent;
use bricknplate_bot::bot::{self, Dispatcher};
use bricknplate_bot::config::Config;
use bricknplate_bot::llm::OpenAiClient;
use bricknplate_bot::memory::RecentEvents;
use bricknplate_bot::stream_info::StreamInfo;
use bricknplate_bot::tools::ToolSet;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bricknplate_bot=info,bricknplate_sdk=info")),
        )
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    let stream_info = StreamInfo::load(&config.stream_info_file)
        .context("Failed to load stream information")?;
    tracing::info!(
        file = %config.stream_info_file.display(),
        has_current_build = stream_info.current_build.is_some(),
        upcoming = stream_info.upcoming_builds.len(),
        faq = stream_info.faq.len(),
        "Loaded stream information"
    );

    let recent = Arc::new(Mutex::new(RecentEvents::default()));
    let tools = Arc::new(ToolSet::new(&config, Arc::new(stream_info), recent.clone()));
    let model = OpenAiClient::new(config.openai_api_key.clone())?
        .with_model(&config.openai_model)
        .with_temperature(config.openai_temperature)
        .with_base_url(&config.openai_base_url);
    let agent = Agent::new(
        Arc::new(model),
        tools,
        &config.bot_username,
        config.max_history_turns,
    );
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(agent),
        &config.bot_username,
        &config.trigger,
        recent,
    ));

    tracing::info!(
        channel = %config.channel,
        model = %config.openai_model,
        trigger = %config.trigger,
        "Bot running. Ctrl+C to stop."
    );

    tokio::select! {
        result = bot::run(&config, dispatcher) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
