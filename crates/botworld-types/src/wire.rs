//! Wire records for the two external HTTP protocols.
//!
//! The **planner protocol** is a batched, persona-aware request used by
//! both the remote-planner controller and the engagement scheduler. The
//! **per-decision protocol** is a flat perception snapshot POSTed by the
//! HTTP controller. Field names follow the services' JSON contracts
//! exactly (snake_case for the planner, camelCase for the per-decision
//! endpoint), so every rename lives here and nowhere else.
//!
//! None of these records outlive the HTTP exchange that carries them.

use serde::{Deserialize, Serialize};

/// Reserved planner response message meaning "say nothing".
pub const SILENCE_TOKEN: &str = "__SILENCE__";

// ---------------------------------------------------------------------------
// Planner protocol
// ---------------------------------------------------------------------------

/// Server descriptor included in every planner request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Stable identifier of the hosting server.
    #[serde(rename = "server_id")]
    pub server_id: String,
    /// Server mode label (e.g. `"LOBBY"`, `"SURVIVAL"`).
    pub mode: String,
    /// Number of currently online human players.
    #[serde(rename = "online_players")]
    pub online_players: u32,
}

/// Persona block describing how a bot should speak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePersona {
    /// Language the bot answers in.
    pub language: String,
    /// Conversational tone.
    pub tone: String,
    /// Style descriptors.
    #[serde(rename = "style_tags")]
    pub style_tags: Vec<String>,
    /// Topics the bot must avoid.
    #[serde(rename = "avoid_topics")]
    pub avoid_topics: Vec<String>,
    /// How knowledgeable the bot should sound.
    #[serde(rename = "knowledge_level")]
    pub knowledge_level: String,
}

/// One bot listed in a planner request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotDescriptor {
    /// The bot's ID, matched against response actions.
    #[serde(rename = "bot_id")]
    pub bot_id: String,
    /// The bot's display name.
    pub name: String,
    /// Whether the bot is currently present in the world.
    pub online: bool,
    /// Remaining per-bot cooldown the planner should respect.
    #[serde(rename = "cooldown_ms")]
    pub cooldown_ms: u64,
    /// How the bot speaks.
    pub persona: WirePersona,
}

/// One chat line in a planner request, tagged by author class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChatLine {
    /// Wall-clock milliseconds of the original message.
    #[serde(rename = "ts_ms")]
    pub ts_ms: u64,
    /// The author's name.
    pub sender: String,
    /// `"PLAYER"` or `"BOT"`.
    #[serde(rename = "sender_type")]
    pub sender_type: String,
    /// The message body.
    pub message: String,
}

/// Planner-side behavior knobs echoed with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSettings {
    /// Maximum actions the planner may return.
    #[serde(rename = "max_actions")]
    pub max_actions: u32,
    /// Minimum artificial speech delay.
    #[serde(rename = "min_delay_ms")]
    pub min_delay_ms: u32,
    /// Maximum artificial speech delay.
    #[serde(rename = "max_delay_ms")]
    pub max_delay_ms: u32,
    /// Probability that the planner answers with silence.
    #[serde(rename = "global_silence_chance")]
    pub global_silence_chance: f64,
    /// Probability that a bot replies to addressed chat.
    #[serde(rename = "reply_chance")]
    pub reply_chance: f64,
}

/// A batched planning request.
///
/// The engagement scheduler uses the same shape with the two optional
/// trailing fields populated; the per-tick planner controller leaves
/// them out of the payload entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerRequest {
    /// Fresh correlation token for this exchange.
    #[serde(rename = "request_id")]
    pub request_id: String,
    /// World clock tick at request time.
    pub tick: u64,
    /// Wall-clock milliseconds at request time.
    #[serde(rename = "time_ms")]
    pub time_ms: u64,
    /// The hosting server.
    pub server: ServerInfo,
    /// Bots the planner should consider.
    pub bots: Vec<BotDescriptor>,
    /// Chronological chat context window.
    pub chat: Vec<WireChatLine>,
    /// Behavior knobs.
    pub settings: PlannerSettings,
    /// Engagement only: a hint prompt describing the desired message.
    #[serde(rename = "example_prompt", skip_serializing_if = "Option::is_none")]
    pub example_prompt: Option<String>,
    /// Engagement only: who the message should address.
    #[serde(rename = "target_player", skip_serializing_if = "Option::is_none")]
    pub target_player: Option<String>,
}

/// One planned action in a planner response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// The bot this action is for.
    #[serde(rename = "bot_id", default)]
    pub bot_id: String,
    /// Delay before the speech should surface, in milliseconds.
    #[serde(rename = "send_after_ms", default)]
    pub send_after_ms: u64,
    /// The message to speak; [`SILENCE_TOKEN`] or blank means silence.
    #[serde(default)]
    pub message: String,
    /// Planner-defined visibility hint; unused by this pipeline.
    #[serde(default)]
    pub visibility: Option<String>,
}

/// A planner response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerResponse {
    /// Echo of the request's correlation token.
    #[serde(rename = "request_id", default)]
    pub request_id: String,
    /// Planned actions, keyed by `bot_id`.
    #[serde(default)]
    pub actions: Vec<PlannedAction>,
}

// ---------------------------------------------------------------------------
// Per-decision protocol (HTTP controller)
// ---------------------------------------------------------------------------

/// The flat perception snapshot POSTed by the per-decision controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    /// The bot's name.
    pub name: String,
    /// The bot's ID as a UUID string.
    pub uuid: String,
    /// World name.
    pub world: String,
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
    /// World clock tick.
    pub server_time_ticks: u64,
    /// Economy balance.
    pub balance: f64,
    /// Nearby players as `"name:distance"` strings.
    pub nearby_players: Vec<String>,
    /// Nearby bots by name.
    #[serde(rename = "nearbyAIPlayers")]
    pub nearby_ai_players: Vec<String>,
    /// Inventory summary lines.
    pub inventory: Vec<String>,
    /// Recent chat lines, most-recent-last.
    pub chat_history: Vec<String>,
}

/// The per-decision endpoint's response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionResponse {
    /// Action variant name, matched case-insensitively.
    #[serde(rename = "type", default)]
    pub action_type: String,
    /// Target x for move/look actions.
    #[serde(default)]
    pub x: Option<f64>,
    /// Target y for move/look actions.
    #[serde(default)]
    pub y: Option<f64>,
    /// Target z for move/look actions.
    #[serde(default)]
    pub z: Option<f64>,
    /// Message for say actions.
    #[serde(default)]
    pub message: Option<String>,
    /// Target player for follow actions.
    #[serde(default)]
    pub target: Option<String>,
}
