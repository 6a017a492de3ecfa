use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The distinguished user id that owns built-in scripts and templates.
pub const SYSTEM_USER_ID: &str = "system";

/// Opaque identifier for a `User`. Raw inbound ids may carry a channel prefix
/// (`tg:42`) until resolved through `ChannelIdentity`; internal ids minted by
/// the store are UUIDv7 strings so they sort by creation time in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn system() -> Self {
        Self(SYSTEM_USER_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_USER_ID
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A channel prefix recognized on inbound raw user ids (`tg:42`, `wa:555…`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram,
    Whatsapp,
    Cli,
    Workflow,
}

impl Channel {
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Channel::Telegram => Some("tg"),
            Channel::Whatsapp => Some("wa"),
            Channel::Cli | Channel::Workflow => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::Whatsapp => "whatsapp",
            Channel::Cli => "cli",
            Channel::Workflow => "workflow",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "telegram" | "tg" => Some(Channel::Telegram),
            "whatsapp" | "wa" => Some(Channel::Whatsapp),
            "cli" => Some(Channel::Cli),
            "workflow" => Some(Channel::Workflow),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Splits a raw inbound id like `tg:42` into `(channel, external_id)`.
///
/// Ids with no recognized prefix are returned as-is with no channel.
pub fn split_channel_prefix(raw_user_id: &str) -> (Option<Channel>, &str) {
    if let Some((prefix, rest)) = raw_user_id.split_once(':') {
        if let Some(channel) = Channel::from_str_loose(prefix) {
            return (Some(channel), rest);
        }
    }
    (None, raw_user_id)
}

/// Normalizes a user id for use as a filesystem path component under
/// `<dataDir>/users/<sanitized>/`. Idempotent: `sanitize_user_id` applied
/// twice yields the same result as applied once. Strips path separators,
/// parent-dir sequences, and control characters, replacing them with `_`.
pub fn sanitize_user_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' | '\\' | ':' => out.push('_'),
            '.' if chars.peek() == Some(&'.') => {
                out.push('_');
                chars.next();
            }
            c if c.is_control() => out.push('_'),
            c => out.push(c),
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// The Executor's model tiers (spec §4.3): cost-ascending capability levels.
/// Declaration order doubles as tier rank (`Haiku < Sonnet < Opus`) so the
/// Orchestrator's "at least the default tier" invariant (spec §8) can be
/// checked with ordinary comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Haiku,
    Sonnet,
    Opus,
}

impl ModelTier {
    pub fn pricing_per_million(&self) -> (f64, f64) {
        match self {
            ModelTier::Haiku => crate::config::PRICE_HAIKU,
            ModelTier::Sonnet => crate::config::PRICE_SONNET,
            ModelTier::Opus => crate::config::PRICE_OPUS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Haiku => "haiku",
            ModelTier::Sonnet => "sonnet",
            ModelTier::Opus => "opus",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["tg:42", "../../etc/passwd", "a/b\\c", "plain", "weird\0name"] {
            let once = sanitize_user_id(raw);
            let twice = sanitize_user_id(&once);
            assert_eq!(once, twice);
            assert!(!once.contains('/'));
            assert!(!once.contains('\\'));
            assert!(!once.contains(':'));
            assert!(!once.contains(".."));
            assert!(!once.chars().any(|c| c.is_control()));
        }
    }

    #[test]
    fn split_prefix_recognizes_known_channels() {
        assert_eq!(
            split_channel_prefix("tg:42"),
            (Some(Channel::Telegram), "42")
        );
        assert_eq!(split_channel_prefix("wa:555"), (Some(Channel::Whatsapp), "555"));
        assert_eq!(split_channel_prefix("alice"), (None, "alice"));
    }
}
