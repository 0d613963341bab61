//! In-process memory: the agent's conversation window and the list of
//! recent supporters.
//!
//! Nothing here survives a restart.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::Message;

/// One completed exchange in chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// The chat line as the agent saw it (`user: text`).
    pub message: String,
    pub reply: String,
}

/// Sliding window of the most recent turns.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Record a turn, evicting the oldest ones past the bound.
    pub fn push(&mut self, message: impl Into<String>, reply: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        self.turns.push_back(Turn {
            message: message.into(),
            reply: reply.into(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// History as alternating user/assistant messages, oldest first.
    pub fn to_messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .flat_map(|t| [Message::user(&t.message), Message::assistant(&t.reply)])
            .collect()
    }
}

/// How many of each kind of supporter to remember.
pub const RECENT_EVENTS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSubscriber {
    pub username: String,
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRaider {
    pub username: String,
    pub viewers: u32,
    pub timestamp: DateTime<Utc>,
}

/// Recent subscribers and raiders, newest last.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RecentEvents {
    pub subscribers: VecDeque<RecentSubscriber>,
    pub raiders: VecDeque<RecentRaider>,
}

impl RecentEvents {
    pub fn add_subscriber(
        &mut self,
        username: &str,
        tier: &str,
        months: Option<u32>,
        message: Option<&str>,
    ) {
        self.subscribers.push_back(RecentSubscriber {
            username: username.to_string(),
            tier: tier.to_string(),
            months,
            message: message.map(str::to_string),
            timestamp: Utc::now(),
        });
        if self.subscribers.len() > RECENT_EVENTS_LIMIT {
            self.subscribers.pop_front();
        }
    }

    pub fn add_raider(&mut self, username: &str, viewers: u32) {
        self.raiders.push_back(RecentRaider {
            username: username.to_string(),
            viewers,
            timestamp: Utc::now(),
        });
        if self.raiders.len() > RECENT_EVENTS_LIMIT {
            self.raiders.pop_front();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty() && self.raiders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn window_evicts_oldest() {
        let mut mem = ConversationMemory::new(3);
        for i in 0..5 {
            mem.push(format!("fan: q{i}"), format!("a{i}"));
        }
        assert_eq!(mem.len(), 3);
        let first = mem.turns().next().unwrap();
        assert_eq!(first.message, "fan: q2");
        assert_eq!(first.reply, "a2");
    }

    #[test]
    fn zero_window_keeps_nothing() {
        let mut mem = ConversationMemory::new(0);
        mem.push("fan: hi", "hello");
        assert!(mem.is_empty());
    }

    #[test]
    fn history_alternates_roles() {
        let mut mem = ConversationMemory::new(5);
        mem.push("fan: hi", "hello!");
        let msgs = mem.to_messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content.as_deref(), Some("fan: hi"));
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].content.as_deref(), Some("hello!"));
    }

    #[test]
    fn recent_events_are_bounded() {
        let mut recent = RecentEvents::default();
        for i in 0..12 {
            recent.add_subscriber(&format!("sub{i}"), "1000", None, None);
            recent.add_raider(&format!("raider{i}"), i);
        }
        assert_eq!(recent.subscribers.len(), RECENT_EVENTS_LIMIT);
        assert_eq!(recent.raiders.len(), RECENT_EVENTS_LIMIT);
        assert_eq!(recent.subscribers.front().unwrap().username, "sub2");
        assert_eq!(recent.raiders.back().unwrap().viewers, 11);
    }
}
