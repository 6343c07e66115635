//! Decision strategies and their registry.
//!
//! A controller turns one perception snapshot into at most one
//! [`Decision`] per tick. Strategies are dispatched through the
//! [`Controller`] enum rather than trait objects so async decision
//! methods stay plain `async fn`s.

mod http;
mod local;
pub(crate) mod planner;

pub use http::HttpController;
pub use local::LocalController;
pub use planner::PlannerController;

use std::collections::HashMap;
use std::sync::Arc;

use botworld_types::{Action, BotProfile, Perception};
use tracing::debug;

use crate::runtime::BotRuntime;

/// Outcome of one decision pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Submit the action now.
    Act(Action),

    /// Submit the action after an artificial delay, dropped if the bot
    /// despawns in the meantime.
    Deferred {
        /// The action to submit once the delay elapses.
        action: Action,
        /// Milliseconds to wait before submission.
        delay_ms: u64,
    },

    /// Decline to decide; the fallback strategy gets a turn.
    Pass,
}

/// Errors surfaced by remote decision strategies.
#[derive(Debug, thiserror::Error)]
pub enum DecideError {
    /// The request never completed.
    #[error("decision transport failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("decision service returned status {0}")]
    Status(u16),

    /// The response body could not be interpreted.
    #[error("decision response unreadable: {0}")]
    Parse(String),
}

/// A decision strategy, dispatched by variant.
#[derive(Debug)]
pub enum Controller {
    /// Local heuristics, always able to decide.
    Local(LocalController),

    /// Per-decision remote HTTP service with local fallback on Pass.
    Http(HttpController),

    /// Remote planner with throttling and deferred speech.
    Planner(Box<PlannerController>),

    /// Fixed decision, for tests and wiring checks.
    Scripted(Decision),
}

impl Controller {
    /// Produce a decision for the bot from the given snapshot.
    pub async fn decide(
        &self,
        profile: &BotProfile,
        perception: &Perception,
        runtime: &mut BotRuntime,
    ) -> Decision {
        match self {
            Self::Local(inner) => inner.decide(profile, perception, runtime),
            Self::Http(inner) => inner.decide(profile, perception).await,
            Self::Planner(inner) => inner.decide(profile, perception).await,
            Self::Scripted(decision) => decision.clone(),
        }
    }
}

/// Run the primary strategy, then the fallback if the primary passes.
/// A passing fallback yields `Pass`, which callers treat as no action.
pub async fn decide_with_fallback(
    primary: &Controller,
    fallback: &Controller,
    profile: &BotProfile,
    perception: &Perception,
    runtime: &mut BotRuntime,
) -> Decision {
    let decision = primary.decide(profile, perception, runtime).await;
    if matches!(decision, Decision::Pass) {
        debug!(bot = %profile.name, "primary strategy passed, consulting fallback");
        return fallback.decide(profile, perception, runtime).await;
    }
    decision
}

/// Named controller strategies with a guaranteed local fallback.
#[derive(Debug)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<Controller>>,
    local: Arc<Controller>,
}

impl ControllerRegistry {
    /// Build a registry around the given local strategy. The local
    /// strategy is registered under `"local"` and doubles as the
    /// fallback for unknown names.
    #[must_use]
    pub fn new(local: LocalController) -> Self {
        let local = Arc::new(Controller::Local(local));
        let mut controllers = HashMap::new();
        controllers.insert("local".to_owned(), Arc::clone(&local));
        Self { controllers, local }
    }

    /// Register a strategy under a name, replacing any previous entry.
    pub fn register(&mut self, name: &str, controller: Controller) {
        self.controllers
            .insert(name.to_owned(), Arc::new(controller));
    }

    /// Resolve a strategy by name, falling back to the local strategy
    /// for unknown names.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Arc<Controller> {
        self.controllers.get(name).map_or_else(
            || {
                debug!(name, "unknown controller name, using local strategy");
                Arc::clone(&self.local)
            },
            Arc::clone,
        )
    }

    /// The always-available local strategy.
    #[must_use]
    pub fn local(&self) -> Arc<Controller> {
        Arc::clone(&self.local)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use botworld_types::{BotId, Position};

    use crate::config::LocalControllerConfig;

    use super::*;

    fn profile() -> BotProfile {
        BotProfile {
            id: BotId::new(),
            name: "Scout".to_owned(),
            controller: "local".to_owned(),
            spawn: Position {
                world: "world".to_owned(),
                x: 0.0,
                y: 64.0,
                z: 0.0,
            },
            roam_radius: 8.0,
            chat_instruction: String::new(),
            metadata: std::collections::BTreeMap::new(),
        }
    }

    fn perception(profile: &BotProfile) -> Perception {
        Perception {
            bot_id: profile.id,
            name: profile.name.clone(),
            world: "world".to_owned(),
            position: profile.spawn.clone(),
            nearby_players: Vec::new(),
            nearby_bots: Vec::new(),
            balance: 0.0,
            inventory: std::collections::BTreeMap::new(),
            chat_history: Vec::new(),
            server_tick: 0,
        }
    }

    #[tokio::test]
    async fn fallback_runs_only_on_pass() {
        let profile = profile();
        let perception = perception(&profile);
        let mut runtime = BotRuntime::new(4);

        let primary = Controller::Scripted(Decision::Act(Action::Say("yes".to_owned())));
        let fallback = Controller::Scripted(Decision::Act(Action::Say("no".to_owned())));
        let decision =
            decide_with_fallback(&primary, &fallback, &profile, &perception, &mut runtime).await;
        assert_eq!(decision, Decision::Act(Action::Say("yes".to_owned())));

        let passing = Controller::Scripted(Decision::Pass);
        let decision =
            decide_with_fallback(&passing, &fallback, &profile, &perception, &mut runtime).await;
        assert_eq!(decision, Decision::Act(Action::Say("no".to_owned())));
    }

    #[test]
    fn unknown_name_resolves_to_local() {
        let registry = ControllerRegistry::new(LocalController::new(
            LocalControllerConfig::default(),
        ));
        let resolved = registry.resolve("no-such-strategy");
        assert!(matches!(*resolved, Controller::Local(_)));
        assert!(matches!(*registry.resolve("local"), Controller::Local(_)));
    }
}
