//! Proactive chat engagement.
//!
//! Two independently scheduled variants keep the world from going
//! quiet: one has a random bot address a random human player, the
//! other has two bots talk to each other. Each variant waits out a
//! randomized idle window that restarts whenever fresh chat arrives,
//! so engagement only fires into actual silence. Bot-to-bot requests
//! carry an escalating silence chance in their settings so the planner
//! lets two bots wind their exchange down instead of looping forever.
//!
//! Engagement speech goes straight through the chat log's outbound
//! path, bypassing the action queue: it is not a reaction to the
//! world, and queue policy (coalescing, cooldown) must not eat it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botworld_chat::{ChatLog, ChatSink};
use botworld_types::{
    BotProfile, PlannerRequest, PlannerResponse, PlannerSettings, RequestId, SenderClass,
    ServerInfo,
};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::config::{EngagementConfig, EngagementWindowConfig, PlannerConfig};
use crate::controller::DecideError;
use crate::controller::planner::{build_chat_window, describe_bot, detect_language, select_speech};
use crate::world::{BotDirectory, PlayerRoster};

/// Which engagement variant a scheduler instance drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementMode {
    /// A bot addresses a human player.
    Players,
    /// Two bots talk to each other.
    BotToBot,
}

/// One engagement variant's scheduler.
pub struct EngagementScheduler {
    mode: EngagementMode,
    config: Mutex<EngagementConfig>,
    planner: PlannerConfig,
    client: reqwest::Client,
    chat_log: Arc<ChatLog>,
    directory: Arc<dyn BotDirectory>,
    roster: Arc<dyn PlayerRoster>,
    sink: Arc<dyn ChatSink>,
    /// Wall-clock ms of the next allowed attempt; zero means unscheduled.
    next_attempt_ms: AtomicU64,
    /// Newest chat-log update the scheduler has accounted for.
    seen_chat_ms: AtomicU64,
    /// Completed bot-to-bot attempts since the last config reload.
    attempt_sequence: AtomicU64,
}

impl std::fmt::Debug for EngagementScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngagementScheduler")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl EngagementScheduler {
    /// Create a scheduler for one engagement variant.
    ///
    /// # Errors
    ///
    /// Returns [`DecideError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        mode: EngagementMode,
        config: EngagementConfig,
        planner: PlannerConfig,
        chat_log: Arc<ChatLog>,
        directory: Arc<dyn BotDirectory>,
        roster: Arc<dyn PlayerRoster>,
        sink: Arc<dyn ChatSink>,
    ) -> Result<Self, DecideError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| DecideError::Transport(err.to_string()))?;
        Ok(Self {
            mode,
            config: Mutex::new(config),
            planner,
            client,
            chat_log,
            directory,
            roster,
            sink,
            next_attempt_ms: AtomicU64::new(0),
            seen_chat_ms: AtomicU64::new(0),
            attempt_sequence: AtomicU64::new(0),
        })
    }

    /// Replace the configuration and reset all scheduling state, so
    /// fresh windows and silence escalation start from scratch.
    pub fn update_config(&self, config: EngagementConfig) {
        if let Ok(mut current) = self.config.lock() {
            *current = config;
        }
        self.next_attempt_ms.store(0, Ordering::SeqCst);
        self.seen_chat_ms.store(0, Ordering::SeqCst);
        self.attempt_sequence.store(0, Ordering::SeqCst);
    }

    /// Advance the scheduler one step. Called once per world tick.
    pub fn tick(&self) {
        let now = wall_clock_ms();
        let config = match self.config.lock() {
            Ok(config) => config.clone(),
            Err(_) => return,
        };
        let window = match self.mode {
            EngagementMode::Players => &config.players,
            EngagementMode::BotToBot => &config.bot_to_bot,
        };
        if !window.enabled {
            return;
        }
        let mut rng = rand::rng();

        if self.next_attempt_ms.load(Ordering::SeqCst) == 0 {
            self.schedule_from(now, window, &mut rng);
            return;
        }

        // Fresh chat restarts the idle window; engagement fires only
        // into sustained silence.
        let chat_update = self.chat_log.last_update_ms();
        if chat_update > self.seen_chat_ms.swap(chat_update, Ordering::SeqCst) {
            self.schedule_from(chat_update.max(now), window, &mut rng);
            return;
        }

        if now < self.next_attempt_ms.load(Ordering::SeqCst) {
            return;
        }

        self.attempt(&config, window, now, &mut rng);
        self.schedule_from(now, window, &mut rng);
    }

    fn schedule_from<R: Rng>(&self, base_ms: u64, window: &EngagementWindowConfig, rng: &mut R) {
        let delay_ms = random_window_ms(window, rng);
        self.next_attempt_ms
            .store(base_ms.saturating_add(delay_ms), Ordering::SeqCst);
    }

    fn attempt<R: Rng>(
        &self,
        config: &EngagementConfig,
        window: &EngagementWindowConfig,
        now: u64,
        rng: &mut R,
    ) {
        if config.base_url.trim().is_empty() {
            return;
        }
        let bots = self.directory.active_profiles();
        let Some((speaker, target)) = pick_pair(self.mode, &bots, &self.roster.online_players(), rng)
        else {
            debug!(mode = ?self.mode, "no engagement pair available");
            return;
        };

        // Bot-to-bot exchanges escalate their silence chance with
        // every attempt; the planner applies it, not this side.
        let silence = match self.mode {
            EngagementMode::Players => self.planner.settings.global_silence_chance,
            EngagementMode::BotToBot => {
                let sequence = self.attempt_sequence.fetch_add(1, Ordering::SeqCst);
                silence_chance(
                    config.bot_to_bot_base_silence_chance,
                    config.bot_to_bot_silence_step,
                    sequence,
                )
            }
        };

        let request = self.build_request(config, window, &speaker, &target, now, silence);
        let url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.engage_path
        );
        let client = self.client.clone();
        let chat_log = Arc::clone(&self.chat_log);
        let directory = Arc::clone(&self.directory);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match send_request(&client, &url, &request).await {
                Ok(response) => {
                    let Some((message, delay_ms)) = select_speech(&response, &speaker) else {
                        return;
                    };
                    if delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    if !directory.is_active(speaker.id) {
                        debug!(bot = %speaker.name, "engagement speaker despawned, dropping speech");
                        return;
                    }
                    chat_log.send_bot_message(speaker.id, &speaker.name, &message, sink.as_ref());
                }
                Err(err) => {
                    warn!(%err, "engagement request failed");
                }
            }
        });
    }

    fn build_request(
        &self,
        config: &EngagementConfig,
        window: &EngagementWindowConfig,
        speaker: &BotProfile,
        target: &str,
        now: u64,
        global_silence_chance: f64,
    ) -> PlannerRequest {
        // Each variant only shows the planner its own side of the
        // conversation: player engagement reacts to what players said,
        // bot-to-bot continues the bots' own thread.
        let wanted = match self.mode {
            EngagementMode::Players => SenderClass::Player,
            EngagementMode::BotToBot => SenderClass::Bot,
        };
        let entries: Vec<_> = self
            .chat_log
            .snapshot()
            .into_iter()
            .filter(|entry| entry.sender_class == wanted)
            .collect();
        let chat = build_chat_window(&entries, config.chat_history_limit, &|name| {
            self.directory.is_bot_name(name)
        });
        let detected = detect_language(&chat);
        let online = u32::try_from(self.roster.online_players().len()).unwrap_or(u32::MAX);
        PlannerRequest {
            request_id: RequestId::new().to_string(),
            tick: 0,
            time_ms: now,
            server: ServerInfo {
                server_id: self.planner.server_id.clone(),
                mode: self.planner.server_mode.clone(),
                online_players: online,
            },
            bots: vec![describe_bot(speaker, &self.planner.persona, detected)],
            chat,
            settings: PlannerSettings {
                max_actions: self.planner.settings.max_actions,
                min_delay_ms: self.planner.settings.min_delay_ms,
                max_delay_ms: self.planner.settings.max_delay_ms,
                global_silence_chance,
                reply_chance: self.planner.settings.reply_chance,
            },
            example_prompt: Some(window.example_prompt.replace("{target}", target)),
            target_player: Some(target.to_owned()),
        }
    }
}

async fn send_request(
    client: &reqwest::Client,
    url: &str,
    request: &PlannerRequest,
) -> Result<PlannerResponse, DecideError> {
    let response = client
        .post(url)
        .json(request)
        .send()
        .await
        .map_err(|err| DecideError::Transport(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(DecideError::Status(status.as_u16()));
    }
    response
        .json::<PlannerResponse>()
        .await
        .map_err(|err| DecideError::Parse(err.to_string()))
}

/// Random idle delay inside the window, in milliseconds.
fn random_window_ms<R: Rng>(window: &EngagementWindowConfig, rng: &mut R) -> u64 {
    let min = u64::from(window.min_idle_secs.min(window.max_idle_secs));
    let max = u64::from(window.max_idle_secs.max(window.min_idle_secs));
    rng.random_range(min..=max).saturating_mul(1000)
}

/// Escalating bot-to-bot silence probability, clamped to `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn silence_chance(base: f64, step: f64, sequence: u64) -> f64 {
    (sequence as f64).mul_add(step, base).clamp(0.0, 1.0)
}

/// Pick a speaker bot and a target name for the given mode.
///
/// Players mode excludes bot names from the target pool so a bot never
/// "engages" another bot by accident; bot-to-bot picks two distinct
/// bots.
fn pick_pair<R: Rng>(
    mode: EngagementMode,
    bots: &[BotProfile],
    players: &[String],
    rng: &mut R,
) -> Option<(BotProfile, String)> {
    match mode {
        EngagementMode::Players => {
            let speaker = bots.choose(rng)?.clone();
            let humans: Vec<&String> = players
                .iter()
                .filter(|name| !bots.iter().any(|bot| bot.name.eq_ignore_ascii_case(name)))
                .collect();
            let target = humans.choose(rng)?;
            Some((speaker, (*target).clone()))
        }
        EngagementMode::BotToBot => {
            if bots.len() < 2 {
                return None;
            }
            let speaker = bots.choose(rng)?.clone();
            let others: Vec<&BotProfile> =
                bots.iter().filter(|bot| bot.id != speaker.id).collect();
            let target = others.choose(rng)?;
            Some((speaker, target.name.clone()))
        }
    }
}

fn wall_clock_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
