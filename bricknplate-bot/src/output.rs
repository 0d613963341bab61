//! Formatting replies for Twitch chat.
//!
//! Twitch rejects messages over 500 characters and has no multi-line
//! messages, so every reply is flattened to one line and cut to fit.

use bricknplate_sdk::client::ClientHandle;

/// Twitch's per-message character limit.
pub const MAX_CHAT_LEN: usize = 500;

const ELLIPSIS: &str = "...";

/// Flatten `text` to a single line no longer than [`MAX_CHAT_LEN`] characters.
pub fn fit_for_chat(text: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if line.chars().count() <= MAX_CHAT_LEN {
        return line;
    }
    let mut cut: String = line.chars().take(MAX_CHAT_LEN - ELLIPSIS.len()).collect();
    cut.push_str(ELLIPSIS);
    cut
}

/// Post a reply to a channel.
pub async fn say(handle: &ClientHandle, channel: &str, text: &str) -> anyhow::Result<()> {
    let text = fit_for_chat(text);
    if text.is_empty() {
        tracing::warn!(channel, "Refusing to post an empty message");
        return Ok(());
    }
    tracing::info!(channel, chars = text.chars().count(), "Posting reply");
    handle.privmsg(channel, &text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(fit_for_chat("Hi there!"), "Hi there!");
    }

    #[test]
    fn long_text_is_cut_with_ellipsis() {
        let long = "b".repeat(600);
        let fitted = fit_for_chat(&long);
        assert_eq!(fitted.chars().count(), MAX_CHAT_LEN);
        assert!(fitted.ends_with("..."));
        assert_eq!(&fitted[..497], &long[..497]);
    }

    #[test]
    fn exactly_at_limit_is_kept() {
        let text = "x".repeat(MAX_CHAT_LEN);
        assert_eq!(fit_for_chat(&text), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "🧱".repeat(MAX_CHAT_LEN);
        let fitted = fit_for_chat(&text);
        assert_eq!(fitted.chars().count(), MAX_CHAT_LEN);
    }

    #[test]
    fn multi_line_replies_are_flattened() {
        assert_eq!(
            fit_for_chat("Current build:\n\n  Titanic  \nat 10%"),
            "Current build: Titanic at 10%"
        );
    }
}
