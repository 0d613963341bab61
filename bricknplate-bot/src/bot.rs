//! Event dispatch: decides which chat events reach the agent.
//!
//! Chat messages are answered only when they mention the trigger word.
//! Subscriptions and raids are always thanked and recorded for the
//! `get_recent_supporters` tool.

use std::sync::Arc;

use anyhow::Result;
use bricknplate_sdk::client::{self, ConnectConfig, ReconnectConfig};
use bricknplate_sdk::event::{Event, SubKind};
use tokio::sync::Mutex;

use crate::agent::{Responder, StreamEvent};
use crate::config::Config;
use crate::memory::RecentEvents;
use crate::output;

/// A message the bot wants posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel: String,
    pub text: String,
}

pub struct Dispatcher {
    responder: Arc<dyn Responder>,
    bot_nick: String,
    trigger: String,
    recent: Arc<Mutex<RecentEvents>>,
}

impl Dispatcher {
    pub fn new(
        responder: Arc<dyn Responder>,
        bot_nick: &str,
        trigger: &str,
        recent: Arc<Mutex<RecentEvents>>,
    ) -> Self {
        Self {
            responder,
            bot_nick: bot_nick.to_lowercase(),
            trigger: trigger.to_lowercase(),
            recent,
        }
    }

    /// Case-insensitive substring match on the trigger word.
    pub fn is_triggered(&self, text: &str) -> bool {
        !self.trigger.is_empty() && text.to_lowercase().contains(&self.trigger)
    }

    /// React to one event. Returns the reply to post, if any.
    pub async fn handle(&self, event: &Event) -> Option<Reply> {
        match event {
            Event::Connected => tracing::info!("Connected to Twitch chat"),
            Event::Registered { nick } => tracing::info!(%nick, "Logged in"),
            Event::Joined { channel, nick } => {
                if nick.eq_ignore_ascii_case(&self.bot_nick) {
                    tracing::info!(%channel, "Joined channel");
                }
            }
            Event::Notice { channel, text } => {
                tracing::info!(channel = ?channel, %text, "Server notice");
            }
            Event::AuthFailed { reason } => tracing::error!(%reason, "Login rejected"),
            Event::Disconnected { reason } => tracing::warn!(%reason, "Disconnected"),

            Event::Message {
                from,
                target,
                text,
                tags,
            } => {
                if from.eq_ignore_ascii_case(&self.bot_nick) || !target.starts_with('#') {
                    return None;
                }
                if !self.is_triggered(text) {
                    return None;
                }
                let username = tags
                    .get("display-name")
                    .filter(|n| !n.is_empty())
                    .unwrap_or(from);
                tracing::info!(user = %username, channel = %target, "Bot mentioned");
                let answer = self.responder.reply(username, text).await;
                return Some(Reply {
                    channel: target.clone(),
                    text: output::fit_for_chat(&answer),
                });
            }

            Event::Subscription {
                channel,
                kind,
                user,
                plan,
                months,
                message,
            } => {
                tracing::info!(%user, ?kind, %plan, ?months, "Subscription");
                self.recent
                    .lock()
                    .await
                    .add_subscriber(user, plan, *months, message.as_deref());
                let event = match (kind, months) {
                    (SubKind::Resub, Some(months)) => StreamEvent::Resub {
                        username: user.clone(),
                        months: *months,
                        tier: plan.clone(),
                        message: message.clone(),
                    },
                    _ => StreamEvent::Subscription {
                        username: user.clone(),
                        tier: plan.clone(),
                    },
                };
                return Some(self.thank(channel, &event).await);
            }

            Event::Raid {
                channel,
                raider,
                viewers,
            } => {
                tracing::info!(%raider, viewers, "Raid");
                self.recent.lock().await.add_raider(raider, *viewers);
                let event = StreamEvent::Raid {
                    username: raider.clone(),
                    viewers: *viewers,
                };
                return Some(self.thank(channel, &event).await);
            }

            Event::RawLine(_) => {}
        }
        None
    }

    async fn thank(&self, channel: &str, event: &StreamEvent) -> Reply {
        let text = self.responder.on_event(event).await;
        Reply {
            channel: channel.to_string(),
            text: output::fit_for_chat(&text),
        }
    }
}

/// Connect to Twitch chat and dispatch events until the login is rejected.
pub async fn run(config: &Config, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let connect = ConnectConfig {
        server_addr: config.irc_server.clone(),
        nick: config.bot_username.to_lowercase(),
        oauth_token: config.oauth_token.clone(),
        // 6667 is Twitch's plaintext port.
        tls: !config.irc_server.ends_with(":6667"),
        ..Default::default()
    };
    let reconnect = ReconnectConfig {
        channels: vec![config.channel.clone()],
        ..Default::default()
    };

    tracing::info!(
        server = %connect.server_addr,
        nick = %connect.nick,
        channel = %config.channel,
        "Starting chat loop"
    );

    client::run_with_reconnect(connect, reconnect, move |handle, event| {
        let dispatcher = dispatcher.clone();
        Box::pin(async move {
            if let Some(reply) = dispatcher.handle(&event).await {
                output::say(&handle, &reply.channel, &reply.text).await?;
            }
            Ok(())
        })
    })
    .await
}
