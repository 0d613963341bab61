//! Events emitted by the chat client for the bot layer to consume.

use std::collections::HashMap;

use crate::irc::Message;

/// Events that the SDK emits to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// TCP/TLS connection is up; registration has started.
    Connected,

    /// Twitch accepted our login (`001`). `nick` is our confirmed login.
    Registered {
        nick: String,
    },

    /// Twitch rejected the OAuth token.
    AuthFailed {
        reason: String,
    },

    /// Joined a channel.
    Joined {
        channel: String,
        nick: String,
    },

    /// A chat message in a channel or a whisper.
    Message {
        from: String,
        target: String,
        text: String,
        /// IRCv3 message tags (empty if none).
        tags: HashMap<String, String>,
    },

    /// New subscription, resubscription or gifted sub.
    Subscription {
        channel: String,
        kind: SubKind,
        /// Login of the subscriber.
        user: String,
        /// Twitch plan id: `Prime`, `1000`, `2000` or `3000`.
        plan: String,
        /// Cumulative months, when Twitch reports them.
        months: Option<u32>,
        /// Optional message the subscriber shared with their resub.
        message: Option<String>,
    },

    /// Another broadcaster raided the channel.
    Raid {
        channel: String,
        raider: String,
        viewers: u32,
    },

    /// Server notice (rate limits, bans, login failures).
    Notice {
        channel: Option<String>,
        text: String,
    },

    /// Connection was closed.
    Disconnected {
        reason: String,
    },

    /// Raw server line (for debugging).
    RawLine(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubKind {
    Sub,
    Resub,
    Gift,
}

impl Event {
    /// Decode a Twitch `USERNOTICE` into a typed event.
    ///
    /// Returns `None` for notice kinds the bot does not react to
    /// (announcements, bits badges, and so on).
    pub fn from_user_notice(msg: &Message) -> Option<Self> {
        if msg.command != "USERNOTICE" {
            return None;
        }
        let channel = msg.params.first()?.clone();
        let login = msg
            .tag("login")
            .map(str::to_string)
            .or_else(|| msg.nick().map(str::to_string))?;

        let kind = match msg.tag("msg-id")? {
            "sub" => SubKind::Sub,
            "resub" => SubKind::Resub,
            "subgift" => SubKind::Gift,
            "raid" => {
                let raider = msg
                    .tag("msg-param-login")
                    .map(str::to_string)
                    .unwrap_or(login);
                let viewers = msg
                    .tag("msg-param-viewerCount")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                return Some(Event::Raid {
                    channel,
                    raider,
                    viewers,
                });
            }
            _ => return None,
        };

        // For gifted subs the subscriber is the recipient, not the gifter.
        let user = match kind {
            SubKind::Gift => msg
                .tag("msg-param-recipient-user-name")
                .map(str::to_string)
                .unwrap_or(login),
            _ => login,
        };

        Some(Event::Subscription {
            channel,
            kind,
            user,
            plan: msg.tag("msg-param-sub-plan").unwrap_or("1000").to_string(),
            months: msg
                .tag("msg-param-cumulative-months")
                .and_then(|v| v.parse().ok()),
            message: msg.params.get(1).filter(|m| !m.is_empty()).cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(line: &str) -> Option<Event> {
        Event::from_user_notice(&Message::parse(line).unwrap())
    }

    #[test]
    fn decodes_resub_with_message() {
        let ev = notice(
            "@login=brickfan;msg-id=resub;msg-param-cumulative-months=7;msg-param-sub-plan=2000 :tmi.twitch.tv USERNOTICE #bricknplate :love the Falcon build",
        )
        .unwrap();
        assert_eq!(
            ev,
            Event::Subscription {
                channel: "#bricknplate".into(),
                kind: SubKind::Resub,
                user: "brickfan".into(),
                plan: "2000".into(),
                months: Some(7),
                message: Some("love the Falcon build".into()),
            }
        );
    }

    #[test]
    fn decodes_first_sub_with_default_plan() {
        let ev = notice("@login=newbie;msg-id=sub :tmi.twitch.tv USERNOTICE #bricknplate").unwrap();
        match ev {
            Event::Subscription { kind, user, plan, months, message, .. } => {
                assert_eq!(kind, SubKind::Sub);
                assert_eq!(user, "newbie");
                assert_eq!(plan, "1000");
                assert_eq!(months, None);
                assert_eq!(message, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn decodes_raid() {
        let ev = notice(
            "@login=bigstreamer;msg-id=raid;msg-param-login=bigstreamer;msg-param-viewerCount=42 :tmi.twitch.tv USERNOTICE #bricknplate",
        )
        .unwrap();
        assert_eq!(
            ev,
            Event::Raid {
                channel: "#bricknplate".into(),
                raider: "bigstreamer".into(),
                viewers: 42,
            }
        );
    }

    #[test]
    fn gifted_sub_credits_the_recipient() {
        let ev = notice(
            "@login=generous;msg-id=subgift;msg-param-recipient-user-name=luckyfan;msg-param-recipient-display-name=LuckyFan;msg-param-sub-plan=1000 :tmi.twitch.tv USERNOTICE #bricknplate :generous gifted a Tier 1 sub to LuckyFan!",
        )
        .unwrap();
        match ev {
            Event::Subscription { kind, user, plan, .. } => {
                assert_eq!(kind, SubKind::Gift);
                assert_eq!(user, "luckyfan");
                assert_eq!(plan, "1000");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn ignores_other_notices() {
        assert!(notice("@login=x;msg-id=announcement :tmi.twitch.tv USERNOTICE #c :hi").is_none());
        assert!(notice(":tmi.twitch.tv PRIVMSG #c :hi").is_none());
    }
}
