//! Configuration loading and typed config structures for the pipeline.
//!
//! The canonical configuration is a YAML file supplied by the hosting
//! layer. This module defines strongly-typed structs mirroring that
//! structure with serde defaults for every field, so a missing section
//! falls back to sane behavior instead of failing the load.
//!
//! Heuristic probabilities and thresholds live here deliberately: the
//! policy *shape* (priority-ordered triggers, probability gating) is
//! fixed in code, but every numeric knob is tunable.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BotworldConfig {
    /// Action queue sizing and timing.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Chat log sizing and outbound rate limiting.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Perception snapshot parameters.
    #[serde(default)]
    pub perception: PerceptionConfig,

    /// Local-heuristic controller knobs.
    #[serde(default)]
    pub local: LocalControllerConfig,

    /// Per-decision HTTP controller.
    #[serde(default)]
    pub http: HttpControllerConfig,

    /// Remote planner controller.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Proactive chat engagement.
    #[serde(default)]
    pub engagement: EngagementConfig,
}

impl BotworldConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for service URLs:
    /// - `BOTWORLD_PLANNER_URL` overrides `planner.base_url`
    /// - `BOTWORLD_ENGAGEMENT_URL` overrides `engagement.base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides for service URLs.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("BOTWORLD_PLANNER_URL")
            && !url.trim().is_empty()
        {
            self.planner.base_url = url;
        }
        if let Ok(url) = std::env::var("BOTWORLD_ENGAGEMENT_URL")
            && !url.trim().is_empty()
        {
            self.engagement.base_url = url;
        }
    }
}

/// Action queue sizing and timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued actions per bot before the oldest is evicted.
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,

    /// Milliseconds after which an unexecuted queued action is discarded.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    /// Milliseconds after an execution during which new submissions
    /// are silently dropped.
    #[serde(default = "default_action_cooldown_ms")]
    pub action_cooldown_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_queue_max_size(),
            action_timeout_ms: default_action_timeout_ms(),
            action_cooldown_ms: default_action_cooldown_ms(),
        }
    }
}

/// Chat log sizing and outbound rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatConfig {
    /// Maximum retained chat entries.
    #[serde(default = "default_chat_max_size")]
    pub max_size: usize,

    /// Per-bot minimum milliseconds between outbound messages.
    #[serde(default = "default_chat_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_size: default_chat_max_size(),
            rate_limit_ms: default_chat_rate_limit_ms(),
        }
    }
}

/// Perception snapshot parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerceptionConfig {
    /// Radius within which players and bots are visible.
    #[serde(default = "default_perception_range")]
    pub range: f64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            range: default_perception_range(),
        }
    }
}

/// Local-heuristic controller knobs.
///
/// The decision order is fixed (reply, look, wander, idle); these
/// fields tune the gates inside it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalControllerConfig {
    /// Reply probability when the bot's name is mentioned.
    #[serde(default = "default_mention_reply_chance")]
    pub mention_reply_chance: f64,

    /// Reply probability for question-like chat.
    #[serde(default = "default_question_reply_chance")]
    pub question_reply_chance: f64,

    /// Reply probability for everything else.
    #[serde(default = "default_base_reply_chance")]
    pub base_reply_chance: f64,

    /// Probability of glancing at a random point instead of wandering.
    #[serde(default = "default_look_chance")]
    pub look_chance: f64,

    /// Distance covered by one wander step.
    #[serde(default = "default_wander_step")]
    pub wander_step: f64,

    /// Maximum remembered last-messages, one per speaker.
    #[serde(default = "default_speaker_memory")]
    pub speaker_memory: usize,
}

impl Default for LocalControllerConfig {
    fn default() -> Self {
        Self {
            mention_reply_chance: default_mention_reply_chance(),
            question_reply_chance: default_question_reply_chance(),
            base_reply_chance: default_base_reply_chance(),
            look_chance: default_look_chance(),
            wander_step: default_wander_step(),
            speaker_memory: default_speaker_memory(),
        }
    }
}

/// Per-decision HTTP controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpControllerConfig {
    /// Whether the controller calls out at all; disabled falls through
    /// to the fallback strategy.
    #[serde(default)]
    pub enabled: bool,

    /// Decision endpoint URL.
    #[serde(default = "default_http_base_url")]
    pub base_url: String,

    /// Connect and request timeout per call, in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-bot minimum milliseconds between decision requests.
    #[serde(default = "default_http_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Additional attempts after a failed call.
    #[serde(default = "default_http_retry_count")]
    pub retry_count: u32,
}

impl Default for HttpControllerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_http_base_url(),
            timeout_ms: default_http_timeout_ms(),
            cooldown_ms: default_http_cooldown_ms(),
            retry_count: default_http_retry_count(),
        }
    }
}

/// Server-wide persona defaults, individually overridable per bot
/// through `persona.*` profile metadata keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersonaConfig {
    /// Language the bots answer in.
    #[serde(default = "default_persona_language")]
    pub language: String,

    /// Conversational tone.
    #[serde(default = "default_persona_tone")]
    pub tone: String,

    /// Style descriptors.
    #[serde(default)]
    pub style_tags: Vec<String>,

    /// Topics bots must avoid.
    #[serde(default)]
    pub avoid_topics: Vec<String>,

    /// How knowledgeable bots should sound.
    #[serde(default = "default_persona_knowledge_level")]
    pub knowledge_level: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            language: default_persona_language(),
            tone: default_persona_tone(),
            style_tags: Vec::new(),
            avoid_topics: Vec::new(),
            knowledge_level: default_persona_knowledge_level(),
        }
    }
}

/// Planner-side behavior knobs echoed with every planner request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerSettingsConfig {
    /// Maximum actions the planner may return.
    #[serde(default = "default_planner_max_actions")]
    pub max_actions: u32,

    /// Minimum artificial speech delay, milliseconds.
    #[serde(default = "default_planner_min_delay_ms")]
    pub min_delay_ms: u32,

    /// Maximum artificial speech delay, milliseconds.
    #[serde(default = "default_planner_max_delay_ms")]
    pub max_delay_ms: u32,

    /// Probability that the planner answers with silence.
    #[serde(default = "default_planner_silence_chance")]
    pub global_silence_chance: f64,

    /// Probability that a bot replies to addressed chat.
    #[serde(default = "default_planner_reply_chance")]
    pub reply_chance: f64,
}

impl Default for PlannerSettingsConfig {
    fn default() -> Self {
        Self {
            max_actions: default_planner_max_actions(),
            min_delay_ms: default_planner_min_delay_ms(),
            max_delay_ms: default_planner_max_delay_ms(),
            global_silence_chance: default_planner_silence_chance(),
            reply_chance: default_planner_reply_chance(),
        }
    }
}

/// Remote planner controller settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    /// Whether the planner controller is active; disabled resolves
    /// every decision to idle.
    #[serde(default)]
    pub enabled: bool,

    /// Planner service base URL. Blank aborts calls without any
    /// network attempt.
    #[serde(default)]
    pub base_url: String,

    /// Path appended to the base URL for planning requests.
    #[serde(default = "default_plan_path")]
    pub plan_path: String,

    /// Connect timeout, milliseconds.
    #[serde(default = "default_planner_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Request timeout, milliseconds.
    #[serde(default = "default_planner_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Identifier of this server in planner requests.
    #[serde(default = "default_server_id")]
    pub server_id: String,

    /// Server mode label in planner requests.
    #[serde(default = "default_server_mode")]
    pub server_mode: String,

    /// Maximum chat lines included per request.
    #[serde(default = "default_planner_chat_limit")]
    pub chat_limit: usize,

    /// Minimum milliseconds between requests for one bot when no new
    /// chat has arrived.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Server-wide persona defaults.
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Behavior knobs echoed to the planner.
    #[serde(default)]
    pub settings: PlannerSettingsConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            plan_path: default_plan_path(),
            connect_timeout_ms: default_planner_connect_timeout_ms(),
            request_timeout_ms: default_planner_request_timeout_ms(),
            server_id: default_server_id(),
            server_mode: default_server_mode(),
            chat_limit: default_planner_chat_limit(),
            request_interval_ms: default_request_interval_ms(),
            persona: PersonaConfig::default(),
            settings: PlannerSettingsConfig::default(),
        }
    }
}

/// One engagement variant's idle window and prompting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngagementWindowConfig {
    /// Whether this engagement variant runs.
    #[serde(default)]
    pub enabled: bool,

    /// Minimum idle seconds before an attempt.
    #[serde(default = "default_engage_min_idle_secs")]
    pub min_idle_secs: u32,

    /// Maximum idle seconds before an attempt.
    #[serde(default = "default_engage_max_idle_secs")]
    pub max_idle_secs: u32,

    /// Hint prompt sent to the planner; `{target}` is replaced with
    /// the selected target's name.
    #[serde(default = "default_example_prompt")]
    pub example_prompt: String,
}

impl Default for EngagementWindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_idle_secs: default_engage_min_idle_secs(),
            max_idle_secs: default_engage_max_idle_secs(),
            example_prompt: default_example_prompt(),
        }
    }
}

/// Proactive chat engagement settings shared by both variants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngagementConfig {
    /// Engagement service base URL (shared by both variants). Blank
    /// skips attempts without any network call.
    #[serde(default)]
    pub base_url: String,

    /// Path appended to the base URL.
    #[serde(default = "default_engage_path")]
    pub engage_path: String,

    /// Connect timeout, milliseconds.
    #[serde(default = "default_engage_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Request timeout, milliseconds.
    #[serde(default = "default_engage_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum chat lines included per request.
    #[serde(default = "default_engage_chat_limit")]
    pub chat_history_limit: usize,

    /// Bot-to-player engagement window.
    #[serde(default)]
    pub players: EngagementWindowConfig,

    /// Bot-to-bot engagement window.
    #[serde(default = "default_bot_to_bot_window")]
    pub bot_to_bot: EngagementWindowConfig,

    /// Starting silence chance for bot-to-bot exchanges.
    #[serde(default = "default_bot2bot_base_silence")]
    pub bot_to_bot_base_silence_chance: f64,

    /// Silence chance added per completed bot-to-bot attempt,
    /// clamped to `[0, 1]`.
    #[serde(default = "default_bot2bot_silence_step")]
    pub bot_to_bot_silence_step: f64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            engage_path: default_engage_path(),
            connect_timeout_ms: default_engage_connect_timeout_ms(),
            request_timeout_ms: default_engage_request_timeout_ms(),
            chat_history_limit: default_engage_chat_limit(),
            players: EngagementWindowConfig::default(),
            bot_to_bot: default_bot_to_bot_window(),
            bot_to_bot_base_silence_chance: default_bot2bot_base_silence(),
            bot_to_bot_silence_step: default_bot2bot_silence_step(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_queue_max_size() -> usize {
    5
}

const fn default_action_timeout_ms() -> u64 {
    4000
}

const fn default_action_cooldown_ms() -> u64 {
    1500
}

const fn default_chat_max_size() -> usize {
    50
}

const fn default_chat_rate_limit_ms() -> u64 {
    3000
}

const fn default_perception_range() -> f64 {
    15.0
}

const fn default_mention_reply_chance() -> f64 {
    0.9
}

const fn default_question_reply_chance() -> f64 {
    0.75
}

const fn default_base_reply_chance() -> f64 {
    0.25
}

const fn default_look_chance() -> f64 {
    0.15
}

const fn default_wander_step() -> f64 {
    1.5
}

const fn default_speaker_memory() -> usize {
    8
}

fn default_http_base_url() -> String {
    String::from("http://localhost:8081/ai/decision")
}

const fn default_http_timeout_ms() -> u64 {
    500
}

const fn default_http_cooldown_ms() -> u64 {
    1000
}

const fn default_http_retry_count() -> u32 {
    1
}

fn default_persona_language() -> String {
    String::from("en")
}

fn default_persona_tone() -> String {
    String::from("casual")
}

fn default_persona_knowledge_level() -> String {
    String::from("average_player")
}

const fn default_planner_max_actions() -> u32 {
    3
}

const fn default_planner_min_delay_ms() -> u32 {
    800
}

const fn default_planner_max_delay_ms() -> u32 {
    4500
}

const fn default_planner_silence_chance() -> f64 {
    0.25
}

const fn default_planner_reply_chance() -> f64 {
    0.65
}

fn default_plan_path() -> String {
    String::from("/v1/plan")
}

const fn default_planner_connect_timeout_ms() -> u64 {
    1500
}

const fn default_planner_request_timeout_ms() -> u64 {
    1500
}

fn default_server_id() -> String {
    String::from("botworld-1")
}

fn default_server_mode() -> String {
    String::from("LOBBY")
}

const fn default_planner_chat_limit() -> usize {
    10
}

const fn default_request_interval_ms() -> u64 {
    30_000
}

const fn default_engage_min_idle_secs() -> u32 {
    120
}

const fn default_engage_max_idle_secs() -> u32 {
    300
}

fn default_example_prompt() -> String {
    String::from("Write a short message engaging the player {target}.")
}

fn default_engage_path() -> String {
    String::from("/v1/engage")
}

const fn default_engage_connect_timeout_ms() -> u64 {
    2000
}

const fn default_engage_request_timeout_ms() -> u64 {
    5000
}

const fn default_engage_chat_limit() -> usize {
    10
}

fn default_bot_to_bot_window() -> EngagementWindowConfig {
    EngagementWindowConfig {
        enabled: false,
        min_idle_secs: 180,
        max_idle_secs: 420,
        example_prompt: String::from("Write a short, playful message to the player {target}."),
    }
}

const fn default_bot2bot_base_silence() -> f64 {
    0.25
}

const fn default_bot2bot_silence_step() -> f64 {
    0.05
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = BotworldConfig::parse("{}").unwrap();
        assert_eq!(config.queue.max_size, 5);
        assert_eq!(config.planner.plan_path, "/v1/plan");
        assert!(!config.planner.enabled);
        assert_eq!(config.engagement.bot_to_bot.min_idle_secs, 180);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = BotworldConfig::parse(
            "queue:\n  max_size: 9\nplanner:\n  enabled: true\n  base_url: http://p:9000\n",
        )
        .unwrap();
        assert_eq!(config.queue.max_size, 9);
        assert_eq!(config.queue.action_timeout_ms, 4000);
        assert!(config.planner.enabled);
        assert_eq!(config.planner.base_url, "http://p:9000");
        assert_eq!(config.planner.request_interval_ms, 30_000);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(BotworldConfig::parse("queue: [").is_err());
    }

    #[test]
    fn persona_defaults_are_sane() {
        let persona = PersonaConfig::default();
        assert_eq!(persona.language, "en");
        assert_eq!(persona.knowledge_level, "average_player");
        assert!(persona.style_tags.is_empty());
    }
}
