//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Bots and planner requests carry strongly-typed IDs so the two can never
//! be mixed at a call site. Bot IDs are stable for the lifetime of a
//! profile; request IDs are single-use correlation tokens minted per
//! planner call and never persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $ctor:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier.
            pub fn new() -> Self {
                Self($ctor())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a bot. UUID v7 (time-ordered) so directory
    /// iteration roughly follows creation order.
    BotId, Uuid::now_v7
}

define_id! {
    /// Single-use correlation token for one planner HTTP exchange.
    /// Random v4 -- there is nothing to order and nothing to index.
    RequestId, Uuid::new_v4
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let bot = BotId::new();
        let request = RequestId::new();
        // Different types -- the compiler enforces no mixing.
        assert_ne!(bot.into_inner(), Uuid::nil());
        assert_ne!(request.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = BotId::new();
        let json = serde_json::to_string(&original).unwrap();
        let restored: BotId = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = BotId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
