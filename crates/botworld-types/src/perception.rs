//! The per-tick observation snapshot handed to controllers.
//!
//! A [`Perception`] is built fresh by the tick orchestrator for each bot
//! on each tick, from collaborator interfaces (world effector, economy,
//! inventory, chat log). It is immutable, never retained beyond one
//! decision cycle, and is the only world knowledge a controller gets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::Position;
use crate::ids::BotId;

/// A human player visible to a bot, with its distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlayer {
    /// The player's name.
    pub name: String,
    /// Straight-line distance to the bot at snapshot time.
    pub distance: f64,
}

/// Everything one bot can currently observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    /// The observing bot's ID.
    pub bot_id: BotId,
    /// The observing bot's name.
    pub name: String,
    /// Name of the world the bot is in.
    pub world: String,
    /// The bot's current position.
    pub position: Position,
    /// Human players within perception range, with distances.
    pub nearby_players: Vec<NearbyPlayer>,
    /// Other bots within perception range (names only).
    pub nearby_bots: Vec<String>,
    /// The bot's economy balance.
    pub balance: f64,
    /// Inventory summary: item name to held count.
    pub inventory: BTreeMap<String, u32>,
    /// Recent chat lines, ordered most-recent-last.
    pub chat_history: Vec<String>,
    /// The world clock tick at snapshot time.
    pub server_tick: u64,
}

impl Perception {
    /// Names of all nearby human players.
    pub fn nearby_player_names(&self) -> impl Iterator<Item = &str> {
        self.nearby_players.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Perception {
        Perception {
            bot_id: BotId::new(),
            name: String::from("Bolek"),
            world: String::from("overworld"),
            position: Position::new("overworld", 10.0, 64.0, -4.0),
            nearby_players: vec![NearbyPlayer {
                name: String::from("Steve"),
                distance: 6.2,
            }],
            nearby_bots: vec![String::from("Lolek")],
            balance: 120.5,
            inventory: BTreeMap::from([(String::from("bread"), 3)]),
            chat_history: vec![String::from("Steve: hi")],
            server_tick: 88,
        }
    }

    #[test]
    fn player_names_iterate_in_order() {
        let p = sample();
        let names: Vec<&str> = p.nearby_player_names().collect();
        assert_eq!(names, vec!["Steve"]);
    }

    #[test]
    fn perception_roundtrip_serde() {
        let p = sample();
        let json = serde_json::to_string(&p).unwrap();
        let restored: Perception = serde_json::from_str(&json).unwrap();
        assert_eq!(p, restored);
    }
}
