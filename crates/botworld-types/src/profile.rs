//! Bot identity, spawn data, and persona metadata.
//!
//! A [`BotProfile`] is created by the hosting layer when a bot is spawned
//! and handed to the pipeline read-only. The metadata map carries
//! free-form `persona.*` overrides consumed by the planner request
//! builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::Position;
use crate::ids::BotId;

/// Identity and configuration of one bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
    /// Stable identifier for the bot.
    pub id: BotId,
    /// Display name; also the chat sender name.
    pub name: String,
    /// Identifier of the controller strategy driving this bot.
    pub controller: String,
    /// Where the bot was spawned; the center of its roam circle.
    pub spawn: Position,
    /// Radius of the circle the bot wanders inside.
    pub roam_radius: f64,
    /// Free-text persona instructions for the local heuristic's style
    /// transform (e.g. "friendly, short answers, asks follow-ups").
    pub chat_instruction: String,
    /// Per-bot metadata; `persona.*` keys override server-wide persona
    /// configuration in planner requests.
    pub metadata: BTreeMap<String, String>,
}

impl BotProfile {
    /// Look up a non-blank metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile_with(key: &str, value: &str) -> BotProfile {
        BotProfile {
            id: BotId::new(),
            name: String::from("Bolek"),
            controller: String::from("local"),
            spawn: Position::new("overworld", 0.0, 64.0, 0.0),
            roam_radius: 8.0,
            chat_instruction: String::new(),
            metadata: BTreeMap::from([(key.to_owned(), value.to_owned())]),
        }
    }

    #[test]
    fn metadata_value_skips_blank() {
        let profile = profile_with("persona.tone", "  ");
        assert_eq!(profile.metadata_value("persona.tone"), None);
    }

    #[test]
    fn metadata_value_returns_present() {
        let profile = profile_with("persona.language", "en");
        assert_eq!(profile.metadata_value("persona.language"), Some("en"));
    }
}
