//! The closed set of actions a bot can take, and their coalescing tags.
//!
//! Actions are immutable once constructed and carry no identity. Equality
//! for queue-coalescing purposes is by variant tag only ([`ActionKind`]),
//! not by parameters: a newer queued "say" supersedes an older one.

use serde::{Deserialize, Serialize};

/// A point in a named world.
///
/// Worlds are opaque strings owned by the hosting server; the pipeline
/// only ever compares them for equality (follow targets must share the
/// bot's world) and forwards coordinates to the world effector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Name of the world this position belongs to.
    pub world: String,
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
}

impl Position {
    /// Create a position from a world name and coordinates.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Whether all coordinates are finite numbers.
    ///
    /// Remote decision payloads can smuggle NaN/infinity through JSON
    /// floats; the executor skips such targets instead of forwarding
    /// them to the world.
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Squared horizontal-plane distance to another position.
    ///
    /// Ignores the world name; callers compare worlds separately.
    pub fn distance_squared_2d(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx.mul_add(dx, dz * dz)
    }
}

/// Which side of a trade the bot is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    /// The bot is buying the item.
    Buy,
    /// The bot is selling the item.
    Sell,
}

/// One decided bot action.
///
/// Produced by controllers, sequenced by the action queue, executed
/// against collaborator interfaces. `Idle` is the universal "do nothing"
/// outcome and is dropped at submission time rather than queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Do nothing this cycle.
    Idle,
    /// Walk toward a position.
    MoveTo(Position),
    /// Turn to face a position without moving.
    LookAt(Position),
    /// Speak a chat message.
    Say(String),
    /// Move toward the named player's current position.
    Follow(String),
    /// Buy or sell an item on the hosting server's market.
    Trade {
        /// Market identifier of the item.
        item_id: String,
        /// How many units to trade.
        amount: u32,
        /// Unit price offered or asked.
        price: f64,
        /// Whether the bot buys or sells.
        direction: TradeDirection,
    },
}

/// The variant tag of an [`Action`], used as the coalescing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Tag for [`Action::Idle`].
    Idle,
    /// Tag for [`Action::MoveTo`].
    MoveTo,
    /// Tag for [`Action::LookAt`].
    LookAt,
    /// Tag for [`Action::Say`].
    Say,
    /// Tag for [`Action::Follow`].
    Follow,
    /// Tag for [`Action::Trade`].
    Trade,
}

impl Action {
    /// The coalescing tag for this action.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Idle => ActionKind::Idle,
            Self::MoveTo(_) => ActionKind::MoveTo,
            Self::LookAt(_) => ActionKind::LookAt,
            Self::Say(_) => ActionKind::Say,
            Self::Follow(_) => ActionKind::Follow,
            Self::Trade { .. } => ActionKind::Trade,
        }
    }

    /// Whether this action is [`Action::Idle`].
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_ignores_parameters() {
        let a = Action::Say(String::from("hello"));
        let b = Action::Say(String::from("goodbye"));
        assert_eq!(a.kind(), b.kind());
        assert_ne!(a, b);
    }

    #[test]
    fn kind_distinguishes_variants() {
        let say = Action::Say(String::from("hi"));
        let follow = Action::Follow(String::from("Steve"));
        assert_ne!(say.kind(), follow.kind());
    }

    #[test]
    fn position_finiteness() {
        assert!(Position::new("overworld", 1.0, 64.0, -3.5).is_finite());
        assert!(!Position::new("overworld", f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Position::new("overworld", 0.0, f64::INFINITY, 0.0).is_finite());
    }

    #[test]
    fn horizontal_distance_ignores_height() {
        let a = Position::new("w", 0.0, 0.0, 0.0);
        let b = Position::new("w", 3.0, 99.0, 4.0);
        assert!((a.distance_squared_2d(&b) - 25.0).abs() < f64::EPSILON);
    }
}
