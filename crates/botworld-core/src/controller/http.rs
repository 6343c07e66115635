//! Per-decision remote HTTP strategy.
//!
//! Every call POSTs one flat perception snapshot and maps the reply to
//! a single action. The strategy passes instead of failing: disabled,
//! throttled, erroring, and unrecognized responses all yield
//! [`Decision::Pass`] so the local fallback keeps the bot alive.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use botworld_types::{
    Action, BotId, BotProfile, DecisionRequest, DecisionResponse, Perception, Position,
};
use tracing::{debug, warn};

use crate::config::HttpControllerConfig;
use crate::controller::{DecideError, Decision};

/// Strategy that asks a remote decision endpoint, one bot at a time.
#[derive(Debug)]
pub struct HttpController {
    config: HttpControllerConfig,
    client: reqwest::Client,
    last_request_ms: Mutex<HashMap<BotId, u64>>,
}

impl HttpController {
    /// Create the strategy with its own pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`DecideError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: HttpControllerConfig) -> Result<Self, DecideError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| DecideError::Transport(err.to_string()))?;
        Ok(Self {
            config,
            client,
            last_request_ms: Mutex::new(HashMap::new()),
        })
    }

    /// Ask the remote endpoint for the bot's next action.
    pub async fn decide(&self, profile: &BotProfile, perception: &Perception) -> Decision {
        if !self.config.enabled || self.config.base_url.trim().is_empty() {
            return Decision::Pass;
        }
        if !self.cooldown_elapsed(profile.id) {
            return Decision::Pass;
        }

        let request = build_request(perception);
        let mut attempts = self.config.retry_count.saturating_add(1);
        while attempts > 0 {
            attempts = attempts.saturating_sub(1);
            match self.call(&request).await {
                Ok(response) => {
                    return parse_decision(&response, &perception.position)
                        .unwrap_or(Decision::Pass);
                }
                Err(err) if attempts > 0 => {
                    debug!(bot = %profile.name, %err, "decision request failed, retrying");
                }
                Err(err) => {
                    warn!(bot = %profile.name, %err, "decision request failed");
                }
            }
        }
        Decision::Pass
    }

    /// Record and check the per-bot request cooldown. A bot that has
    /// never asked is always allowed through.
    fn cooldown_elapsed(&self, bot: BotId) -> bool {
        let now = wall_clock_ms();
        let Ok(mut last_map) = self.last_request_ms.lock() else {
            return false;
        };
        let last = last_map.get(&bot).copied().unwrap_or(0);
        if last != 0 && now.saturating_sub(last) < self.config.cooldown_ms {
            return false;
        }
        last_map.insert(bot, now);
        true
    }

    async fn call(&self, request: &DecisionRequest) -> Result<DecisionResponse, DecideError> {
        let response = self
            .client
            .post(&self.config.base_url)
            .json(request)
            .send()
            .await
            .map_err(|err| DecideError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DecideError::Status(status.as_u16()));
        }
        response
            .json::<DecisionResponse>()
            .await
            .map_err(|err| DecideError::Parse(err.to_string()))
    }
}

/// Flatten a perception snapshot into the endpoint's request shape.
fn build_request(perception: &Perception) -> DecisionRequest {
    DecisionRequest {
        name: perception.name.clone(),
        uuid: perception.bot_id.to_string(),
        world: perception.world.clone(),
        x: perception.position.x,
        y: perception.position.y,
        z: perception.position.z,
        server_time_ticks: perception.server_tick,
        balance: perception.balance,
        nearby_players: perception
            .nearby_players
            .iter()
            .map(|p| format!("{}:{:.1}", p.name, p.distance))
            .collect(),
        nearby_ai_players: perception.nearby_bots.clone(),
        inventory: perception
            .inventory
            .iter()
            .map(|(item, count)| format!("{item} x{count}"))
            .collect(),
        chat_history: perception.chat_history.clone(),
    }
}

/// Map a decision response onto an action.
///
/// Missing move/look coordinates fall back to the bot's current
/// position axis by axis. Unknown action types yield `None` so the
/// caller passes to the fallback strategy.
fn parse_decision(response: &DecisionResponse, current: &Position) -> Option<Decision> {
    let action_type = response.action_type.trim().to_lowercase();
    match action_type.as_str() {
        "move_to" | "look_at" => {
            let target = Position {
                world: current.world.clone(),
                x: response.x.unwrap_or(current.x),
                y: response.y.unwrap_or(current.y),
                z: response.z.unwrap_or(current.z),
            };
            if !target.is_finite() {
                return None;
            }
            let action = if action_type == "move_to" {
                Action::MoveTo(target)
            } else {
                Action::LookAt(target)
            };
            Some(Decision::Act(action))
        }
        "say" => {
            let message = response
                .message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("hi")
                .to_owned();
            Some(Decision::Act(Action::Say(message)))
        }
        "follow" => {
            let target = response.target.clone().unwrap_or_default();
            Some(Decision::Act(Action::Follow(target)))
        }
        "idle" | "trade" => Some(Decision::Act(Action::Idle)),
        _ => None,
    }
}

fn wall_clock_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn current() -> Position {
        Position {
            world: "world".to_owned(),
            x: 10.0,
            y: 64.0,
            z: -3.0,
        }
    }

    fn response(json: &str) -> DecisionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn move_fills_missing_axes_from_current_position() {
        let decision =
            parse_decision(&response(r#"{"type":"move_to","x":20.0}"#), &current()).unwrap();
        let Decision::Act(Action::MoveTo(target)) = decision else {
            panic!("expected a move");
        };
        assert!((target.x - 20.0).abs() < f64::EPSILON);
        assert!((target.y - 64.0).abs() < f64::EPSILON);
        assert!((target.z - -3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn say_defaults_blank_messages() {
        let decision =
            parse_decision(&response(r#"{"type":"say","message":"  "}"#), &current()).unwrap();
        assert_eq!(decision, Decision::Act(Action::Say("hi".to_owned())));
    }

    #[test]
    fn action_type_is_case_insensitive() {
        let decision =
            parse_decision(&response(r#"{"type":" LOOK_AT ","y":80.0}"#), &current()).unwrap();
        assert!(matches!(decision, Decision::Act(Action::LookAt(_))));
    }

    #[test]
    fn unknown_type_yields_none() {
        assert!(parse_decision(&response(r#"{"type":"dance"}"#), &current()).is_none());
        assert!(parse_decision(&response("{}"), &current()).is_none());
    }

    #[test]
    fn non_finite_coordinates_yield_none() {
        let bad = DecisionResponse {
            action_type: "move_to".to_owned(),
            x: Some(f64::NAN),
            y: None,
            z: None,
            message: None,
            target: None,
        };
        assert!(parse_decision(&bad, &current()).is_none());
    }

    #[test]
    fn trade_is_acknowledged_as_idle() {
        let decision = parse_decision(&response(r#"{"type":"trade"}"#), &current()).unwrap();
        assert_eq!(decision, Decision::Act(Action::Idle));
    }

    #[test]
    fn request_flattens_the_snapshot() {
        let perception = Perception {
            bot_id: BotId::new(),
            name: "Scout".to_owned(),
            world: "world".to_owned(),
            position: current(),
            nearby_players: vec![botworld_types::NearbyPlayer {
                name: "ala".to_owned(),
                distance: 4.25,
            }],
            nearby_bots: vec!["Wanderer".to_owned()],
            balance: 12.5,
            inventory: std::collections::BTreeMap::from([("bread".to_owned(), 3)]),
            chat_history: vec!["ala: hi".to_owned()],
            server_tick: 99,
        };
        let request = build_request(&perception);
        assert_eq!(request.nearby_players, vec!["ala:4.2".to_owned()]);
        assert_eq!(request.inventory, vec!["bread x3".to_owned()]);
        assert_eq!(request.server_time_ticks, 99);
    }
}
