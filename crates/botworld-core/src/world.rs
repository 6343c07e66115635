//! Collaborator traits the hosting world layer implements.
//!
//! The pipeline never touches the world directly. Everything it reads
//! (positions, rosters, balances) and everything it does (movement,
//! chat) goes through these seams, which keeps the whole decision and
//! action path testable with in-memory fakes.

use std::collections::BTreeMap;

use botworld_types::{BotId, BotProfile, Position};

/// Applies physical effects to the world on behalf of a bot.
pub trait WorldEffector: Send + Sync {
    /// Current position of the bot, if it is present in the world.
    fn current_position(&self, bot: BotId) -> Option<Position>;

    /// Move the bot toward the given position.
    fn move_to(&self, bot: BotId, target: &Position);

    /// Turn the bot to face the given position.
    fn look_at(&self, bot: BotId, target: &Position);

    /// Current position of a named human player, if online.
    fn player_position(&self, name: &str) -> Option<Position>;
}

/// Registry of the bots currently alive in the world.
pub trait BotDirectory: Send + Sync {
    /// Profiles of every currently-spawned bot.
    fn active_profiles(&self) -> Vec<BotProfile>;

    /// Whether the bot with the given id is still spawned.
    fn is_active(&self, bot: BotId) -> bool;

    /// Whether the given chat sender name belongs to a bot.
    fn is_bot_name(&self, name: &str) -> bool;
}

/// Names of the human players currently online.
pub trait PlayerRoster: Send + Sync {
    /// Online human player names.
    fn online_players(&self) -> Vec<String>;
}

/// Source of bot account balances.
pub trait EconomySource: Send + Sync {
    /// Balance of the bot's account; zero when no economy is wired up.
    fn balance(&self, bot: BotId) -> f64;
}

/// Source of bot inventory summaries.
pub trait InventorySource: Send + Sync {
    /// Item id to count, for the bot's current inventory.
    fn inventory_summary(&self, bot: BotId) -> BTreeMap<String, u32>;
}

/// Source of the world's logical clock.
pub trait WorldClock: Send + Sync {
    /// Monotonically increasing world tick counter.
    fn current_tick(&self) -> u64;
}
