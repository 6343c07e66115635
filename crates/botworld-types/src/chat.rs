//! Chat log entries and sender classification.
//!
//! The chat log stores one [`ChatEntry`] per observed message. Entries
//! are immutable; the monotonically increasing `sequence` is the
//! authoritative ordering key (wall-clock timestamps may tie or go
//! backward across threads).

use serde::{Deserialize, Serialize};

/// Classification of a chat line's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderClass {
    /// A human player.
    Player,
    /// A pipeline-controlled bot.
    Bot,
    /// Could not be attributed (e.g. a raw line with no sender prefix).
    Unknown,
}

/// One immutable chat log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// The full line as `"sender: message"`.
    pub raw_line: String,
    /// The author's name (`"unknown"` if unattributed).
    pub sender: String,
    /// The message body, trimmed.
    pub message: String,
    /// Whether the author was a player, a bot, or unknown.
    pub sender_class: SenderClass,
    /// Wall-clock milliseconds when the entry was recorded.
    pub timestamp_ms: u64,
    /// Strictly increasing per-log sequence number; the ordering key.
    pub sequence: u64,
}

impl ChatEntry {
    /// Build an entry from parts, normalizing blank senders to `"unknown"`
    /// and trimming the message.
    pub fn from_parts(
        sender: &str,
        message: &str,
        sender_class: SenderClass,
        timestamp_ms: u64,
        sequence: u64,
    ) -> Self {
        let sender = if sender.trim().is_empty() {
            String::from("unknown")
        } else {
            sender.trim().to_owned()
        };
        let message = message.trim().to_owned();
        let raw_line = format!("{sender}: {message}");
        let sender_class = sender_class_or_unknown(sender_class, &sender);
        Self {
            raw_line,
            sender,
            message,
            sender_class,
            timestamp_ms,
            sequence,
        }
    }

    /// Parse a raw `"sender: message"` line with no known author class.
    ///
    /// Lines without a `sender:` prefix are kept whole as the message
    /// with sender `"unknown"`.
    pub fn from_line(raw_line: &str, timestamp_ms: u64) -> Self {
        match raw_line.split_once(':') {
            Some((sender, message)) if !sender.trim().is_empty() => Self::from_parts(
                sender,
                message,
                SenderClass::Unknown,
                timestamp_ms,
                0,
            ),
            _ => Self::from_parts(
                "unknown",
                raw_line,
                SenderClass::Unknown,
                timestamp_ms,
                0,
            ),
        }
    }
}

/// Unattributed senders never count as players; scheduling decisions key
/// off player activity and a spoofed blank sender must not trigger them.
/// By this point blank senders have been normalized to the `"unknown"`
/// sentinel, so that is what the guard checks.
fn sender_class_or_unknown(class: SenderClass, sender: &str) -> SenderClass {
    if matches!(class, SenderClass::Player) && sender == "unknown" {
        SenderClass::Unknown
    } else {
        class
    }
}
