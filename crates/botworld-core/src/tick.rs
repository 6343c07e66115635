//! The per-tick pipeline pass.
//!
//! Each pass executes at most one queued action per bot, snapshots the
//! world into a perception per bot, and spawns one decision task per
//! bot off the tick path. Decision results are submitted back to the
//! queue from those tasks, so a slow remote strategy can never stall
//! the world tick. Deferred speech sleeps in its task and re-checks
//! that the bot is still spawned before submitting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botworld_chat::{ChatLog, ChatSink};
use botworld_types::{BotId, BotProfile, NearbyPlayer, Perception, Position};
use tracing::{debug, trace};

use crate::config::BotworldConfig;
use crate::controller::{ControllerRegistry, Decision, decide_with_fallback};
use crate::engagement::EngagementScheduler;
use crate::queue::{ActionQueue, ExecutionContext};
use crate::runtime::BotRuntime;
use crate::world::{
    BotDirectory, EconomySource, InventorySource, PlayerRoster, WorldClock, WorldEffector,
};

/// The world-facing collaborators the pipeline runs against.
#[derive(Clone)]
pub struct WorldServices {
    /// Physical world effects.
    pub effector: Arc<dyn WorldEffector>,
    /// Spawned-bot registry.
    pub directory: Arc<dyn BotDirectory>,
    /// Online human players.
    pub roster: Arc<dyn PlayerRoster>,
    /// Account balances.
    pub economy: Arc<dyn EconomySource>,
    /// Inventory summaries.
    pub inventory: Arc<dyn InventorySource>,
    /// World tick counter.
    pub clock: Arc<dyn WorldClock>,
    /// Outbound chat delivery.
    pub sink: Arc<dyn ChatSink>,
}

/// What one pipeline pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    /// World tick the pass ran at.
    pub tick: u64,
    /// Bots that were present in the world and processed.
    pub bots_processed: usize,
    /// Queued actions executed this pass.
    pub actions_executed: usize,
}

/// Drives the whole pipeline once per world tick.
pub struct TickOrchestrator {
    perception_range: f64,
    speaker_memory: usize,
    queue: Arc<ActionQueue>,
    registry: Arc<ControllerRegistry>,
    chat_log: Arc<ChatLog>,
    services: WorldServices,
    schedulers: Vec<Arc<EngagementScheduler>>,
    runtimes: Mutex<HashMap<BotId, Arc<tokio::sync::Mutex<BotRuntime>>>>,
}

impl std::fmt::Debug for TickOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickOrchestrator")
            .field("perception_range", &self.perception_range)
            .finish_non_exhaustive()
    }
}

impl TickOrchestrator {
    /// Wire the pipeline together.
    #[must_use]
    pub fn new(
        config: &BotworldConfig,
        queue: Arc<ActionQueue>,
        registry: Arc<ControllerRegistry>,
        chat_log: Arc<ChatLog>,
        services: WorldServices,
        schedulers: Vec<Arc<EngagementScheduler>>,
    ) -> Self {
        Self {
            perception_range: config.perception.range,
            speaker_memory: config.local.speaker_memory,
            queue,
            registry,
            chat_log,
            services,
            schedulers,
            runtimes: Mutex::new(HashMap::new()),
        }
    }

    /// Run one pipeline pass over every spawned bot.
    pub fn run_tick(&self) -> TickSummary {
        let tick = self.services.clock.current_tick();
        for scheduler in &self.schedulers {
            scheduler.tick();
        }

        let profiles = self.services.directory.active_profiles();
        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };
        for profile in profiles {
            let Some(position) = self.services.effector.current_position(profile.id) else {
                trace!(bot = %profile.name, "bot has no world position, skipping");
                continue;
            };
            summary.bots_processed = summary.bots_processed.saturating_add(1);

            let ctx = ExecutionContext {
                effector: self.services.effector.as_ref(),
                chat_log: &self.chat_log,
                sink: self.services.sink.as_ref(),
                bot_name: &profile.name,
            };
            if self.queue.tick(profile.id, &ctx).is_some() {
                summary.actions_executed = summary.actions_executed.saturating_add(1);
            }

            let perception = self.build_perception(&profile, position, tick);
            self.spawn_decision(profile, perception);
        }
        summary
    }

    /// Snapshot the world from one bot's point of view.
    fn build_perception(&self, profile: &BotProfile, position: Position, tick: u64) -> Perception {
        let range_squared = self.perception_range * self.perception_range;
        let mut nearby_players = Vec::new();
        for name in self.services.roster.online_players() {
            let Some(player_position) = self.services.effector.player_position(&name) else {
                continue;
            };
            if player_position.world != position.world {
                continue;
            }
            let distance_squared = player_position.distance_squared_2d(&position);
            if distance_squared <= range_squared {
                nearby_players.push(NearbyPlayer {
                    name,
                    distance: distance_squared.sqrt(),
                });
            }
        }

        let mut nearby_bots = Vec::new();
        for other in self.services.directory.active_profiles() {
            if other.id == profile.id {
                continue;
            }
            let Some(other_position) = self.services.effector.current_position(other.id) else {
                continue;
            };
            if other_position.world == position.world
                && other_position.distance_squared_2d(&position) <= range_squared
            {
                nearby_bots.push(other.name);
            }
        }

        Perception {
            bot_id: profile.id,
            name: profile.name.clone(),
            world: position.world.clone(),
            position,
            nearby_players,
            nearby_bots,
            balance: self.services.economy.balance(profile.id),
            inventory: self.services.inventory.inventory_summary(profile.id),
            chat_history: self.chat_log.raw_lines(),
            server_tick: tick,
        }
    }

    /// Run the bot's decision off the tick path and feed the result
    /// back into the queue.
    fn spawn_decision(&self, profile: BotProfile, perception: Perception) {
        let controller = self.registry.resolve(&profile.controller);
        let fallback = self.registry.local();
        let runtime = self.runtime_for(profile.id);
        let queue = Arc::clone(&self.queue);
        let directory = Arc::clone(&self.services.directory);
        tokio::spawn(async move {
            let decision = {
                let mut runtime = runtime.lock().await;
                decide_with_fallback(&controller, &fallback, &profile, &perception, &mut runtime)
                    .await
            };
            match decision {
                Decision::Act(action) => {
                    queue.submit(profile.id, action);
                }
                Decision::Deferred { action, delay_ms } => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    if directory.is_active(profile.id) {
                        queue.submit(profile.id, action);
                    } else {
                        debug!(bot = %profile.name, "deferred action dropped after despawn");
                    }
                }
                Decision::Pass => {}
            }
        });
    }

    fn runtime_for(&self, bot: BotId) -> Arc<tokio::sync::Mutex<BotRuntime>> {
        let Ok(mut runtimes) = self.runtimes.lock() else {
            return Arc::new(tokio::sync::Mutex::new(BotRuntime::new(
                self.speaker_memory,
            )));
        };
        Arc::clone(runtimes.entry(bot).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(BotRuntime::new(
                self.speaker_memory,
            )))
        }))
    }

    /// Drop all per-bot state for a despawned bot.
    pub fn remove_bot(&self, bot: BotId) {
        self.queue.remove_bot(bot);
        if let Ok(mut runtimes) = self.runtimes.lock() {
            runtimes.remove(&bot);
        }
    }
}
