//! Per-bot bounded action queues with submission and execution policy.
//!
//! Submission policy, applied in order: idle actions are never queued,
//! anything arriving inside the post-execution cooldown is dropped, an
//! action of the same kind as the queue tail replaces the tail, and a
//! full queue evicts its oldest entry before appending.
//!
//! Execution runs at most one action per bot per tick. A head entry
//! older than the staleness timeout is discarded instead, and that
//! discard consumes the tick.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use botworld_chat::{ChatLog, ChatSink};
use botworld_types::{Action, BotId, Position};
use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::world::WorldEffector;

/// World handles an action needs at execution time.
pub struct ExecutionContext<'a> {
    /// Physical world effects.
    pub effector: &'a dyn WorldEffector,

    /// Shared chat log for speech.
    pub chat_log: &'a ChatLog,

    /// Outbound chat delivery.
    pub sink: &'a dyn ChatSink,

    /// Display name of the executing bot.
    pub bot_name: &'a str,
}

#[derive(Debug)]
struct QueuedAction {
    action: Action,
    created_at_ms: u64,
}

#[derive(Debug, Default)]
struct BotQueueState {
    queue: VecDeque<QueuedAction>,
    last_executed_ms: u64,
}

/// Bounded, per-bot action queues shared across the pipeline.
#[derive(Debug)]
pub struct ActionQueue {
    states: Mutex<HashMap<BotId, BotQueueState>>,
    max_size: usize,
    timeout_ms: u64,
    cooldown_ms: u64,
}

impl ActionQueue {
    /// Create queues with the given sizing and timing policy.
    #[must_use]
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            max_size: config.max_size.max(1),
            timeout_ms: config.action_timeout_ms,
            cooldown_ms: config.action_cooldown_ms,
        }
    }

    /// Submit an action for a bot, applying the submission policy.
    /// Returns whether the action was enqueued (or coalesced in).
    pub fn submit(&self, bot: BotId, action: Action) -> bool {
        self.submit_at(bot, action, wall_clock_ms())
    }

    fn submit_at(&self, bot: BotId, action: Action, now_ms: u64) -> bool {
        if action.is_idle() {
            return false;
        }
        let Ok(mut states) = self.states.lock() else {
            warn!("action queue lock poisoned, dropping submission");
            return false;
        };
        let state = states.entry(bot).or_default();
        if state.last_executed_ms != 0
            && now_ms.saturating_sub(state.last_executed_ms) < self.cooldown_ms
        {
            debug!(%bot, kind = ?action.kind(), "submission dropped by cooldown");
            return false;
        }
        if let Some(tail) = state.queue.back_mut()
            && tail.action.kind() == action.kind()
        {
            tail.action = action;
            tail.created_at_ms = now_ms;
            return true;
        }
        if state.queue.len() >= self.max_size {
            state.queue.pop_front();
        }
        state.queue.push_back(QueuedAction {
            action,
            created_at_ms: now_ms,
        });
        true
    }

    /// Run one execution step for a bot: discard a stale head, or
    /// execute the head and start the cooldown. Returns the action
    /// that was executed, if any.
    pub fn tick(&self, bot: BotId, ctx: &ExecutionContext<'_>) -> Option<Action> {
        self.tick_at(bot, ctx, wall_clock_ms())
    }

    fn tick_at(&self, bot: BotId, ctx: &ExecutionContext<'_>, now_ms: u64) -> Option<Action> {
        let head = {
            let Ok(mut states) = self.states.lock() else {
                warn!("action queue lock poisoned, skipping tick");
                return None;
            };
            let state = states.get_mut(&bot)?;
            let head = state.queue.pop_front()?;
            if now_ms.saturating_sub(head.created_at_ms) > self.timeout_ms {
                debug!(%bot, kind = ?head.action.kind(), "stale action discarded");
                return None;
            }
            state.last_executed_ms = now_ms;
            head.action
        };
        execute(bot, &head, ctx);
        Some(head)
    }

    /// Number of actions currently queued for a bot.
    #[must_use]
    pub fn len(&self, bot: BotId) -> usize {
        self.states
            .lock()
            .map(|states| states.get(&bot).map_or(0, |s| s.queue.len()))
            .unwrap_or(0)
    }

    /// Whether a bot has no queued actions.
    #[must_use]
    pub fn is_empty(&self, bot: BotId) -> bool {
        self.len(bot) == 0
    }

    /// Drop all queue state for a despawned bot.
    pub fn remove_bot(&self, bot: BotId) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(&bot);
        }
    }
}

/// Apply one action's world effect through the execution context.
fn execute(bot: BotId, action: &Action, ctx: &ExecutionContext<'_>) {
    match action {
        Action::Idle => {}
        Action::MoveTo(target) => {
            if target.is_finite() {
                ctx.effector.move_to(bot, target);
            } else {
                warn!(%bot, "move target with non-finite coordinates dropped");
            }
        }
        Action::LookAt(target) => {
            if target.is_finite() {
                ctx.effector.look_at(bot, target);
            } else {
                warn!(%bot, "look target with non-finite coordinates dropped");
            }
        }
        Action::Say(message) => {
            ctx.chat_log
                .send_bot_message(bot, ctx.bot_name, message, ctx.sink);
        }
        Action::Follow(player_name) => {
            if player_name.trim().is_empty() {
                return;
            }
            let Some(own) = ctx.effector.current_position(bot) else {
                return;
            };
            let Some(target) = ctx.effector.player_position(player_name) else {
                debug!(%bot, player = player_name, "follow target offline");
                return;
            };
            if target.world != own.world {
                debug!(%bot, player = player_name, "follow target in another world");
                return;
            }
            // Move on the bot's own horizontal plane so a follow never
            // teleports it vertically.
            let leveled = Position {
                world: target.world,
                x: target.x,
                y: own.y,
                z: target.z,
            };
            ctx.effector.move_to(bot, &leveled);
        }
        Action::Trade { item_id, .. } => {
            debug!(%bot, item = item_id, "trade action acknowledged without effect");
        }
    }
}

fn wall_clock_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    use botworld_types::ActionKind;

    use super::*;

    #[derive(Default)]
    struct RecordingWorld {
        moves: StdMutex<Vec<Position>>,
        looks: StdMutex<Vec<Position>>,
        own_position: Option<Position>,
        players: BTreeMap<String, Position>,
    }

    impl WorldEffector for RecordingWorld {
        fn current_position(&self, _bot: BotId) -> Option<Position> {
            self.own_position.clone()
        }

        fn move_to(&self, _bot: BotId, target: &Position) {
            self.moves.lock().unwrap().push(target.clone());
        }

        fn look_at(&self, _bot: BotId, target: &Position) {
            self.looks.lock().unwrap().push(target.clone());
        }

        fn player_position(&self, name: &str) -> Option<Position> {
            self.players.get(name).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        lines: StdMutex<Vec<String>>,
    }

    impl ChatSink for RecordingSink {
        fn broadcast(&self, bot_name: &str, message: &str) {
            self.lines.lock().unwrap().push(format!("{bot_name}: {message}"));
        }
    }

    fn pos(x: f64, z: f64) -> Position {
        Position {
            world: "world".to_owned(),
            x,
            y: 64.0,
            z,
        }
    }

    fn queue() -> ActionQueue {
        ActionQueue::new(&QueueConfig {
            max_size: 3,
            action_timeout_ms: 4000,
            action_cooldown_ms: 1500,
        })
    }

    #[test]
    fn idle_is_never_queued() {
        let q = queue();
        let bot = BotId::new();
        assert!(!q.submit_at(bot, Action::Idle, 1000));
        assert!(q.is_empty(bot));
    }

    #[test]
    fn same_kind_tail_is_replaced_not_appended() {
        let q = queue();
        let bot = BotId::new();
        assert!(q.submit_at(bot, Action::MoveTo(pos(1.0, 1.0)), 1000));
        assert!(q.submit_at(bot, Action::MoveTo(pos(2.0, 2.0)), 1010));
        assert!(q.submit_at(bot, Action::Say("hi".to_owned()), 1020));
        assert!(q.submit_at(bot, Action::MoveTo(pos(3.0, 3.0)), 1030));
        assert!(q.submit_at(bot, Action::Say("later".to_owned()), 1040));
        assert_eq!(q.len(bot), 3);

        let world = RecordingWorld::default();
        let sink = RecordingSink::default();
        let log = ChatLog::new(50, 0);
        let ctx = ExecutionContext {
            effector: &world,
            chat_log: &log,
            sink: &sink,
            bot_name: "Bot",
        };
        let mut kinds = Vec::new();
        let mut now = 2000;
        while let Some(action) = q.tick_at(bot, &ctx, now) {
            kinds.push(action.kind());
            now += 100;
        }
        assert_eq!(
            kinds,
            vec![ActionKind::Say, ActionKind::MoveTo, ActionKind::Say]
        );
        let moves = world.moves.lock().unwrap();
        assert_eq!(moves.len(), 1);
        assert!((moves.first().unwrap().x - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_queue_evicts_oldest() {
        let q = queue();
        let bot = BotId::new();
        q.submit_at(bot, Action::Say("a".to_owned()), 1000);
        q.submit_at(bot, Action::MoveTo(pos(1.0, 1.0)), 1010);
        q.submit_at(bot, Action::LookAt(pos(2.0, 2.0)), 1020);
        q.submit_at(bot, Action::Follow("ala".to_owned()), 1030);
        assert_eq!(q.len(bot), 3);

        let world = RecordingWorld::default();
        let sink = RecordingSink::default();
        let log = ChatLog::new(50, 0);
        let ctx = ExecutionContext {
            effector: &world,
            chat_log: &log,
            sink: &sink,
            bot_name: "Bot",
        };
        // The evicted head was the Say, so nothing is broadcast.
        let mut now = 2000;
        while q.tick_at(bot, &ctx, now).is_some() {
            now += 100;
        }
        assert!(sink.lines.lock().unwrap().is_empty());
    }

    #[test]
    fn cooldown_drops_submissions_after_execution() {
        let q = queue();
        let bot = BotId::new();
        q.submit_at(bot, Action::Say("hi".to_owned()), 1000);

        let world = RecordingWorld::default();
        let sink = RecordingSink::default();
        let log = ChatLog::new(50, 0);
        let ctx = ExecutionContext {
            effector: &world,
            chat_log: &log,
            sink: &sink,
            bot_name: "Bot",
        };
        assert!(q.tick_at(bot, &ctx, 2000).is_some());
        assert!(!q.submit_at(bot, Action::Say("too soon".to_owned()), 2500));
        assert!(q.submit_at(bot, Action::Say("ok".to_owned()), 3600));
    }

    #[test]
    fn stale_head_is_discarded_and_consumes_the_tick() {
        let q = queue();
        let bot = BotId::new();
        q.submit_at(bot, Action::Say("old".to_owned()), 1000);
        q.submit_at(bot, Action::MoveTo(pos(5.0, 5.0)), 6000);

        let world = RecordingWorld::default();
        let sink = RecordingSink::default();
        let log = ChatLog::new(50, 0);
        let ctx = ExecutionContext {
            effector: &world,
            chat_log: &log,
            sink: &sink,
            bot_name: "Bot",
        };
        // 1000 + 4000 < 7000 so the Say is stale.
        assert!(q.tick_at(bot, &ctx, 7000).is_none());
        assert!(sink.lines.lock().unwrap().is_empty());
        // Next tick executes the move normally.
        assert!(q.tick_at(bot, &ctx, 7100).is_some());
        assert_eq!(world.moves.lock().unwrap().len(), 1);
    }

    #[test]
    fn follow_snaps_to_own_height_and_requires_same_world() {
        let mut world = RecordingWorld {
            own_position: Some(pos(0.0, 0.0)),
            ..RecordingWorld::default()
        };
        world.players.insert(
            "ala".to_owned(),
            Position {
                world: "world".to_owned(),
                x: 10.0,
                y: 120.0,
                z: -4.0,
            },
        );
        world.players.insert(
            "ela".to_owned(),
            Position {
                world: "nether".to_owned(),
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
        );
        let sink = RecordingSink::default();
        let log = ChatLog::new(50, 0);
        let ctx = ExecutionContext {
            effector: &world,
            chat_log: &log,
            sink: &sink,
            bot_name: "Bot",
        };
        let bot = BotId::new();

        execute(bot, &Action::Follow("ala".to_owned()), &ctx);
        {
            let moves = world.moves.lock().unwrap();
            let target = moves.first().unwrap();
            assert!((target.y - 64.0).abs() < f64::EPSILON);
            assert!((target.x - 10.0).abs() < f64::EPSILON);
        }

        execute(bot, &Action::Follow("ela".to_owned()), &ctx);
        assert_eq!(world.moves.lock().unwrap().len(), 1);

        execute(bot, &Action::Follow("  ".to_owned()), &ctx);
        assert_eq!(world.moves.lock().unwrap().len(), 1);
    }

    #[test]
    fn non_finite_targets_are_dropped() {
        let world = RecordingWorld::default();
        let sink = RecordingSink::default();
        let log = ChatLog::new(50, 0);
        let ctx = ExecutionContext {
            effector: &world,
            chat_log: &log,
            sink: &sink,
            bot_name: "Bot",
        };
        let bad = Position {
            world: "world".to_owned(),
            x: f64::NAN,
            y: 64.0,
            z: 0.0,
        };
        execute(BotId::new(), &Action::MoveTo(bad.clone()), &ctx);
        execute(BotId::new(), &Action::LookAt(bad), &ctx);
        assert!(world.moves.lock().unwrap().is_empty());
        assert!(world.looks.lock().unwrap().is_empty());
    }

    #[test]
    fn remove_bot_clears_state() {
        let q = queue();
        let bot = BotId::new();
        q.submit_at(bot, Action::Say("hi".to_owned()), 1000);
        q.remove_bot(bot);
        assert!(q.is_empty(bot));
    }
}
