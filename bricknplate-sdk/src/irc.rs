//! IRCv3 line framing as used by Twitch chat.
//!
//! Twitch speaks plain IRC with message tags. A line looks like
//! `@badge-info=;display-name=Ann :ann!ann@ann.tmi.twitch.tv PRIVMSG #chan :hi`.

use std::collections::HashMap;
use std::fmt;

/// A single parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// IRCv3 tags, already unescaped.
    pub tags: HashMap<String, String>,
    /// Source prefix without the leading `:`.
    pub prefix: Option<String>,
    /// Command or three-digit numeric, uppercased as received.
    pub command: String,
    /// Parameters; a trailing parameter keeps its spaces.
    pub params: Vec<String>,
}

impl Message {
    /// Parse one line. Trailing CR/LF is ignored. Returns `None` for blank
    /// or command-less lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.is_empty() {
            return None;
        }

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, remainder) = stripped.split_once(' ')?;
            for pair in raw_tags.split(';').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = remainder.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, remainder) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = remainder.trim_start();
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, remainder)) => {
                    params.push(param.to_string());
                    rest = remainder;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command: command.to_string(),
            params,
        })
    }

    /// Nick portion of the prefix (`nick!user@host` → `nick`).
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split(['!', '@']).next().unwrap_or(p))
    }

    /// Tag lookup that treats an empty value as absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();
            let rendered: Vec<String> = keys
                .into_iter()
                .map(|k| match self.tags[k].as_str() {
                    "" => k.clone(),
                    v => format!("{k}={}", escape_tag_value(v)),
                })
                .collect();
            write!(f, "@{} ", rendered.join(";"))?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, init)) = self.params.split_last() {
            for p in init {
                write!(f, " {p}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}

fn unescape_tag_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
