//! Remote planner strategy.
//!
//! Unlike the per-decision controller this strategy is throttled: it
//! only calls out when new chat has arrived since the bot's last
//! request or the request interval has elapsed. It builds a
//! persona-aware batched request, sends exactly one POST, and maps the
//! first matching planned action to speech. Everything that can go
//! wrong resolves to idling, never to the fallback, because the
//! planner is expected to be authoritative when enabled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botworld_chat::{ChatLog, strip_self_prefix};
use botworld_types::{
    Action, BotDescriptor, BotId, BotProfile, ChatEntry, Perception, PlannerRequest,
    PlannerResponse, PlannerSettings, RequestId, SILENCE_TOKEN, ServerInfo, WireChatLine,
    WirePersona,
};
use tracing::{debug, warn};

use crate::config::{PersonaConfig, PlannerConfig};
use crate::controller::{DecideError, Decision};
use crate::world::{BotDirectory, PlayerRoster};

/// Characters that only occur in Polish text.
const POLISH_DIACRITICS: &[char] = &[
    'ą', 'ć', 'ę', 'ł', 'ń', 'ó', 'ś', 'ź', 'ż',
];

/// Common Polish words that survive diacritic-free typing.
const POLISH_WORDS: &[&str] = &[
    "jest", "nie", "tak", "czy", "jak", "gdzie", "siema", "czesc", "dzieki", "witam",
];

const ENGLISH_WORDS: &[&str] = &[
    "the", "you", "what", "hello", "thanks", "yes", "this", "have",
];

/// Strategy backed by the remote planner service.
pub struct PlannerController {
    config: PlannerConfig,
    client: reqwest::Client,
    chat_log: Arc<ChatLog>,
    directory: Arc<dyn BotDirectory>,
    roster: Arc<dyn PlayerRoster>,
    last_request_ms: Mutex<HashMap<BotId, u64>>,
}

impl std::fmt::Debug for PlannerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlannerController {
    /// Create the strategy around the shared chat log and world views.
    ///
    /// # Errors
    ///
    /// Returns [`DecideError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        config: PlannerConfig,
        chat_log: Arc<ChatLog>,
        directory: Arc<dyn BotDirectory>,
        roster: Arc<dyn PlayerRoster>,
    ) -> Result<Self, DecideError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| DecideError::Transport(err.to_string()))?;
        Ok(Self {
            config,
            client,
            chat_log,
            directory,
            roster,
            last_request_ms: Mutex::new(HashMap::new()),
        })
    }

    /// Ask the planner what the bot should say, if anything.
    pub async fn decide(&self, profile: &BotProfile, perception: &Perception) -> Decision {
        if !self.config.enabled {
            return Decision::Act(Action::Idle);
        }
        if !self.claim_request_slot(profile.id) {
            return Decision::Act(Action::Idle);
        }
        if self.config.base_url.trim().is_empty() {
            warn!(bot = %profile.name, "planner enabled without a base URL");
            return Decision::Act(Action::Idle);
        }

        let request = self.build_request(profile, perception);
        let response = match self.call(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(bot = %profile.name, %err, "planner request failed");
                return Decision::Act(Action::Idle);
            }
        };

        let Some((message, delay_ms)) = select_speech(&response, profile) else {
            return Decision::Act(Action::Idle);
        };
        debug!(bot = %profile.name, delay_ms, "planner produced speech");
        if delay_ms > 0 {
            Decision::Deferred {
                action: Action::Say(message),
                delay_ms,
            }
        } else {
            Decision::Act(Action::Say(message))
        }
    }

    /// Throttle gate: a bot may ask again once fresh chat has arrived
    /// since its last request or the request interval has elapsed. A
    /// bot that has never asked is always allowed. Claiming records
    /// the attempt immediately so a failed exchange still waits.
    fn claim_request_slot(&self, bot: BotId) -> bool {
        let now = wall_clock_ms();
        let chat_update = self.chat_log.last_update_ms();
        let Ok(mut last_map) = self.last_request_ms.lock() else {
            return false;
        };
        let allowed = should_send(
            last_map.get(&bot).copied(),
            chat_update,
            now,
            self.config.request_interval_ms,
        );
        if allowed {
            last_map.insert(bot, now);
        }
        allowed
    }

    fn build_request(&self, profile: &BotProfile, perception: &Perception) -> PlannerRequest {
        let entries = self.chat_log.snapshot();
        let chat = build_chat_window(&entries, self.config.chat_limit, &|name| {
            self.directory.is_bot_name(name)
        });
        let detected = detect_language(&chat);
        let online = u32::try_from(self.roster.online_players().len()).unwrap_or(u32::MAX);
        PlannerRequest {
            request_id: RequestId::new().to_string(),
            tick: perception.server_tick,
            time_ms: wall_clock_ms(),
            server: ServerInfo {
                server_id: self.config.server_id.clone(),
                mode: self.config.server_mode.clone(),
                online_players: online,
            },
            bots: vec![describe_bot(profile, &self.config.persona, detected)],
            chat,
            settings: PlannerSettings {
                max_actions: self.config.settings.max_actions,
                min_delay_ms: self.config.settings.min_delay_ms,
                max_delay_ms: self.config.settings.max_delay_ms,
                global_silence_chance: self.config.settings.global_silence_chance,
                reply_chance: self.config.settings.reply_chance,
            },
            example_prompt: None,
            target_player: None,
        }
    }

    async fn call(&self, request: &PlannerRequest) -> Result<PlannerResponse, DecideError> {
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.plan_path
        );
        let response = self
            .client
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
}

/// Whether a bot may send a planner request now.
pub(crate) const fn should_send(
    last_request_ms: Option<u64>,
    chat_update_ms: u64,
    now_ms: u64,
    interval_ms: u64,
) -> bool {
    match last_request_ms {
        None => true,
        Some(last) => chat_update_ms > last || now_ms.saturating_sub(last) >= interval_ms,
    }
}

/// Build the chronological chat window for a planner request.
///
/// Bot-authored lines have the author's own name prefix stripped so
/// the planner never sees a bot quoting itself.
pub(crate) fn build_chat_window(
    entries: &[ChatEntry],
    limit: usize,
    is_bot: &dyn Fn(&str) -> bool,
) -> Vec<WireChatLine> {
    let start = entries.len().saturating_sub(limit);
    entries
        .iter()
        .skip(start)
        .map(|entry| {
            let bot_authored = is_bot(&entry.sender);
            let message = if bot_authored {
                strip_self_prefix(&entry.message, &entry.sender)
            } else {
                entry.message.clone()
            };
            WireChatLine {
                ts_ms: entry.timestamp_ms,
                sender: entry.sender.clone(),
                sender_type: if bot_authored {
                    "BOT".to_owned()
                } else {
                    "PLAYER".to_owned()
                },
                message,
            }
        })
        .collect()
}

/// Guess the conversation language from recent player lines.
///
/// Bot lines are ignored so the bots' own configured language never
/// reinforces itself.
pub(crate) fn detect_language(chat: &[WireChatLine]) -> Option<&'static str> {
    let mut polish = 0_u32;
    let mut english = 0_u32;
    for line in chat.iter().rev().take(10) {
        if line.sender_type == "BOT" {
            continue;
        }
        let lowered = line.message.to_lowercase();
        if lowered.chars().any(|c| POLISH_DIACRITICS.contains(&c)) {
            polish = polish.saturating_add(2);
        }
        for word in lowered.split_whitespace() {
            if POLISH_WORDS.contains(&word) {
                polish = polish.saturating_add(1);
            }
            if ENGLISH_WORDS.contains(&word) {
                english = english.saturating_add(1);
            }
        }
    }
    match (polish, english) {
        (0, 0) => None,
        (p, e) if p >= e => Some("pl"),
        _ => Some("en"),
    }
}

/// Build the persona block for a bot, resolving each field through the
/// override chain: profile metadata, then detected chat language (for
/// the language field only), then server-wide defaults.
pub(crate) fn describe_bot(
    profile: &BotProfile,
    defaults: &PersonaConfig,
    detected_language: Option<&str>,
) -> BotDescriptor {
    let language = profile
        .metadata_value("persona.language")
        .map(str::to_owned)
        .or_else(|| detected_language.map(str::to_owned))
        .unwrap_or_else(|| defaults.language.clone());
    let tone = profile
        .metadata_value("persona.tone")
        .map_or_else(|| defaults.tone.clone(), str::to_owned);
    let knowledge_level = profile
        .metadata_value("persona.knowledge-level")
        .map_or_else(|| defaults.knowledge_level.clone(), str::to_owned);
    let style_tags = profile
        .metadata_value("persona.style-tags")
        .map_or_else(|| defaults.style_tags.clone(), split_tags);
    let avoid_topics = profile
        .metadata_value("persona.avoid-topics")
        .map_or_else(|| defaults.avoid_topics.clone(), split_tags);
    BotDescriptor {
        bot_id: profile.id.to_string(),
        name: profile.name.clone(),
        online: true,
        cooldown_ms: 0,
        persona: WirePersona {
            language,
            tone,
            style_tags,
            avoid_topics,
            knowledge_level,
        },
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Pick the first planned action addressed to this bot and reduce it
/// to speech. Silence tokens, blank messages, and messages that are
/// empty after self-prefix stripping all mean "say nothing".
pub(crate) fn select_speech(
    response: &PlannerResponse,
    profile: &BotProfile,
) -> Option<(String, u64)> {
    let own_id = profile.id.to_string();
    let planned = response
        .actions
        .iter()
        .find(|action| action.bot_id == own_id)?;
    let message = planned.message.trim();
    if message.is_empty() || message == SILENCE_TOKEN {
        return None;
    }
    let stripped = strip_self_prefix(message, &profile.name);
    if stripped.trim().is_empty() {
        return None;
    }
    Some((stripped, planned.send_after_ms))
}

fn wall_clock_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use botworld_types::{PlannedAction, Position, SenderClass};

    use super::*;

    fn profile() -> BotProfile {
        BotProfile {
            id: BotId::new(),
            name: "Bolek".to_owned(),
            controller: "planner".to_owned(),
            spawn: Position {
                world: "world".to_owned(),
                x: 0.0,
                y: 64.0,
                z: 0.0,
            },
            roam_radius: 8.0,
            chat_instruction: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn first_request_is_always_allowed() {
        assert!(should_send(None, 0, 0, 30_000));
    }

    #[test]
    fn fresh_chat_reopens_the_gate_before_the_interval() {
        assert!(!should_send(Some(10_000), 9_000, 12_000, 30_000));
        assert!(should_send(Some(10_000), 11_000, 12_000, 30_000));
    }

    #[test]
    fn interval_elapse_reopens_the_gate_without_chat() {
        assert!(should_send(Some(10_000), 0, 40_000, 30_000));
        assert!(!should_send(Some(10_000), 0, 39_999, 30_000));
    }

    #[test]
    fn chat_window_tags_and_strips_bot_lines() {
        let entries = vec![
            ChatEntry::from_parts("ala", "hi there", SenderClass::Player, 100, 1),
            ChatEntry::from_parts("Bolek", "Bolek: hello ala", SenderClass::Bot, 200, 2),
        ];
        let window = build_chat_window(&entries, 10, &|name| name == "Bolek");
        assert_eq!(window.len(), 2);
        let player = window.first().unwrap();
        assert_eq!(player.sender_type, "PLAYER");
        assert_eq!(player.message, "hi there");
        let bot = window.get(1).unwrap();
        assert_eq!(bot.sender_type, "BOT");
        assert_eq!(bot.message, "hello ala");
    }

    #[test]
    fn chat_window_keeps_only_the_newest_lines() {
        let entries: Vec<ChatEntry> = (0..20)
            .map(|i| {
                ChatEntry::from_parts("ala", &format!("line {i}"), SenderClass::Player, i, i)
            })
            .collect();
        let window = build_chat_window(&entries, 5, &|_| false);
        assert_eq!(window.len(), 5);
        assert_eq!(window.first().unwrap().message, "line 15");
        assert_eq!(window.last().unwrap().message, "line 19");
    }

    #[test]
    fn polish_diacritics_win_language_detection() {
        let chat = vec![WireChatLine {
            ts_ms: 1,
            sender: "ala".to_owned(),
            sender_type: "PLAYER".to_owned(),
            message: "cześć wszystkim".to_owned(),
        }];
        assert_eq!(detect_language(&chat), Some("pl"));
    }

    #[test]
    fn english_words_detect_english() {
        let chat = vec![WireChatLine {
            ts_ms: 1,
            sender: "steve".to_owned(),
            sender_type: "PLAYER".to_owned(),
            message: "hello you all, what is this".to_owned(),
        }];
        assert_eq!(detect_language(&chat), Some("en"));
    }

    #[test]
    fn bot_lines_do_not_influence_detection() {
        let chat = vec![WireChatLine {
            ts_ms: 1,
            sender: "Bolek".to_owned(),
            sender_type: "BOT".to_owned(),
            message: "hello you, what is the plan".to_owned(),
        }];
        assert_eq!(detect_language(&chat), None);
    }

    #[test]
    fn persona_metadata_overrides_beat_detection_and_defaults() {
        let mut profile = profile();
        profile
            .metadata
            .insert("persona.language".to_owned(), "de".to_owned());
        profile
            .metadata
            .insert("persona.style-tags".to_owned(), "dry, laconic ,".to_owned());
        let descriptor = describe_bot(&profile, &PersonaConfig::default(), Some("pl"));
        assert_eq!(descriptor.persona.language, "de");
        assert_eq!(
            descriptor.persona.style_tags,
            vec!["dry".to_owned(), "laconic".to_owned()]
        );
        assert_eq!(descriptor.persona.tone, "casual");
    }

    #[test]
    fn detected_language_beats_the_config_default() {
        let descriptor = describe_bot(&profile(), &PersonaConfig::default(), Some("pl"));
        assert_eq!(descriptor.persona.language, "pl");
        let descriptor = describe_bot(&profile(), &PersonaConfig::default(), None);
        assert_eq!(descriptor.persona.language, "en");
    }

    #[test]
    fn blank_metadata_values_fall_through() {
        let mut profile = profile();
        profile
            .metadata
            .insert("persona.tone".to_owned(), "   ".to_owned());
        let descriptor = describe_bot(&profile, &PersonaConfig::default(), None);
        assert_eq!(descriptor.persona.tone, "casual");
    }

    #[test]
    fn speech_selection_matches_bot_id_and_handles_silence() {
        let profile = profile();
        let response = PlannerResponse {
            request_id: String::new(),
            actions: vec![
                PlannedAction {
                    bot_id: "someone-else".to_owned(),
                    send_after_ms: 0,
                    message: "not for you".to_owned(),
                    visibility: None,
                },
                PlannedAction {
                    bot_id: profile.id.to_string(),
                    send_after_ms: 1200,
                    message: format!("{}: sure thing", profile.name),
                    visibility: None,
                },
            ],
        };
        let (message, delay) = select_speech(&response, &profile).unwrap();
        assert_eq!(message, "sure thing");
        assert_eq!(delay, 1200);
    }

    #[test]
    fn silence_token_and_blank_messages_yield_nothing() {
        let profile = profile();
        for message in [SILENCE_TOKEN, "", "   ", "Bolek:"] {
            let response = PlannerResponse {
                request_id: String::new(),
                actions: vec![PlannedAction {
                    bot_id: profile.id.to_string(),
                    send_after_ms: 0,
                    message: message.to_owned(),
                    visibility: None,
                }],
            };
            assert!(select_speech(&response, &profile).is_none(), "{message:?}");
        }
    }

    #[test]
    fn unmatched_bot_id_yields_nothing() {
        let response = PlannerResponse {
            request_id: String::new(),
            actions: Vec::new(),
        };
        assert!(select_speech(&response, &profile()).is_none());
    }
}
