//! Always-available local decision heuristics.
//!
//! The policy is priority ordered: answer fresh chat if a trigger
//! fires, otherwise occasionally glance somewhere, otherwise wander
//! inside the roam circle, otherwise idle. Every probabilistic gate is
//! tuned through [`LocalControllerConfig`]; the helpers that hold the
//! actual logic are pure functions over an injected RNG so they stay
//! deterministic under test.

use botworld_types::{Action, BotProfile, Perception, Position};
use rand::Rng;
use tracing::trace;

use crate::config::LocalControllerConfig;
use crate::controller::Decision;
use crate::runtime::BotRuntime;

/// Leading words that mark a chat line as a question even without a
/// question mark.
const QUESTION_WORDS: &[&str] = &[
    "what", "why", "how", "who", "where", "when", "which", "can", "could", "do", "does", "is",
    "are", "will",
];

const MENTION_REPLIES: &[&str] = &[
    "yeah, i'm here",
    "you called?",
    "that's me",
    "hm? what's up",
];

const QUESTION_REPLIES: &[&str] = &[
    "good question, honestly",
    "hard to say",
    "not sure, i'd have to check",
    "depends on the day",
];

const BASE_REPLIES: &[&str] = &[
    "heh, true",
    "makes sense",
    "fair enough",
    "yeah",
];

const FOLLOW_UPS: &[&str] = &["what about you?", "right?", "you been around long?"];

/// Why the heuristic chose to reply to a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyTrigger {
    /// The bot's name appears in the message.
    Mention,
    /// The message reads like a question.
    Question,
    /// Ordinary chatter.
    Base,
}

impl ReplyTrigger {
    /// Priority when several unseen lines compete; higher wins.
    const fn rank(self) -> u8 {
        match self {
            Self::Mention => 2,
            Self::Question => 1,
            Self::Base => 0,
        }
    }
}

/// Heuristic strategy that never calls out of process.
#[derive(Debug)]
pub struct LocalController {
    config: LocalControllerConfig,
}

impl LocalController {
    /// Create the strategy with the given tuning.
    #[must_use]
    pub const fn new(config: LocalControllerConfig) -> Self {
        Self { config }
    }

    /// Decide the bot's next action from the snapshot.
    pub fn decide(
        &self,
        profile: &BotProfile,
        perception: &Perception,
        runtime: &mut BotRuntime,
    ) -> Decision {
        let mut rng = rand::rng();
        self.decide_with(profile, perception, runtime, &mut rng)
    }

    fn decide_with<R: Rng>(
        &self,
        profile: &BotProfile,
        perception: &Perception,
        runtime: &mut BotRuntime,
        rng: &mut R,
    ) -> Decision {
        if let Some(reply) = self.chat_reply(profile, perception, runtime, rng) {
            return Decision::Act(Action::Say(reply));
        }

        if profile.roam_radius <= 0.0 {
            return Decision::Act(Action::Idle);
        }

        if rng.random_bool(self.config.look_chance.clamp(0.0, 1.0)) {
            let target = random_point_in_circle(
                &profile.spawn,
                profile.roam_radius,
                perception.position.y,
                rng,
            );
            return Decision::Act(Action::LookAt(target));
        }

        Decision::Act(Action::MoveTo(self.wander_step(
            profile,
            &perception.position,
            runtime,
            rng,
        )))
    }

    /// Answer unseen chat if a trigger fires its gate.
    ///
    /// Every line after the last-replied marker is scanned and the
    /// highest-priority trigger among them wins, so a name mention is
    /// never drowned out by newer unrelated chatter. One probability
    /// roll is made for the winning trigger; a successful reply marks
    /// the whole scanned window as seen.
    fn chat_reply<R: Rng>(
        &self,
        profile: &BotProfile,
        perception: &Perception,
        runtime: &mut BotRuntime,
        rng: &mut R,
    ) -> Option<String> {
        let history = &perception.chat_history;
        let start = runtime
            .last_responded_line
            .as_deref()
            .and_then(|marker| {
                history
                    .iter()
                    .rposition(|line| line == marker)
                    .map(|index| index.saturating_add(1))
            })
            .unwrap_or(0);

        let mut best: Option<(ReplyTrigger, &str, &str)> = None;
        for line in history.iter().skip(start) {
            let Some((speaker, message)) = line.split_once(':').map(|(s, m)| (s.trim(), m.trim()))
            else {
                continue;
            };
            let Some(trigger) = reply_trigger(&profile.name, speaker, message) else {
                continue;
            };
            // Newer lines win ties, so >= on equal rank.
            if best.is_none_or(|(held, _, _)| trigger.rank() >= held.rank()) {
                best = Some((trigger, speaker, message));
            }
        }
        let (trigger, speaker, message) = best?;

        let chance = match trigger {
            ReplyTrigger::Mention => self.config.mention_reply_chance,
            ReplyTrigger::Question => self.config.question_reply_chance,
            ReplyTrigger::Base => self.config.base_reply_chance,
        };
        if !rng.random_bool(chance.clamp(0.0, 1.0)) {
            return None;
        }
        runtime.last_responded_line = history.last().cloned();
        runtime.remember_message(speaker, message);
        let pool = match trigger {
            ReplyTrigger::Mention => MENTION_REPLIES,
            ReplyTrigger::Question => QUESTION_REPLIES,
            ReplyTrigger::Base => BASE_REPLIES,
        };
        let base = pick(pool, rng);
        trace!(bot = %profile.name, ?trigger, "heuristic reply fired");
        Some(apply_style(
            &profile.chat_instruction,
            base,
            pick(FOLLOW_UPS, rng),
        ))
    }

    /// Advance one step toward the wander target, picking a fresh
    /// target when there is none, the bot has arrived, or the target
    /// has drifted outside the roam circle.
    fn wander_step<R: Rng>(
        &self,
        profile: &BotProfile,
        position: &Position,
        runtime: &mut BotRuntime,
        rng: &mut R,
    ) -> Position {
        let step = self.config.wander_step.max(0.1);
        let needs_new_target = runtime.wander_target.as_ref().is_none_or(|target| {
            target.distance_squared_2d(position) <= step * step
                || target.distance_squared_2d(&profile.spawn)
                    > profile.roam_radius * profile.roam_radius
        });
        if needs_new_target {
            runtime.wander_target = Some(random_point_in_circle(
                &profile.spawn,
                profile.roam_radius,
                position.y,
                rng,
            ));
        }
        let target = runtime
            .wander_target
            .clone()
            .unwrap_or_else(|| profile.spawn.clone());
        step_toward(position, &target, step)
    }
}

/// Classify a chat line, or `None` when the bot should stay out of it.
fn reply_trigger(bot_name: &str, speaker: &str, message: &str) -> Option<ReplyTrigger> {
    if speaker.is_empty() || message.is_empty() {
        return None;
    }
    if speaker.eq_ignore_ascii_case(bot_name) {
        return None;
    }
    let lowered = message.to_lowercase();
    if lowered.contains(&bot_name.to_lowercase()) {
        return Some(ReplyTrigger::Mention);
    }
    let first_word = lowered.split_whitespace().next().unwrap_or("");
    if lowered.contains('?') || QUESTION_WORDS.contains(&first_word) {
        return Some(ReplyTrigger::Question);
    }
    Some(ReplyTrigger::Base)
}

/// Shape a reply according to the profile's chat instruction keywords.
///
/// Keywords compose in a fixed order: `short` truncates first, then
/// `friendly` adds warmth, `chatty` tacks on a follow-up, and `emoji`
/// appends a kaomoji last.
fn apply_style(instruction: &str, base: &str, follow_up: &str) -> String {
    let instruction = instruction.to_lowercase();
    let mut text = base.to_owned();
    if instruction.contains("short") {
        text = text
            .split(|c| c == ',' || c == '.')
            .next()
            .unwrap_or(&text)
            .trim()
            .to_owned();
    }
    if instruction.contains("friendly") && !text.ends_with('!') {
        text.push('!');
    }
    if instruction.contains("chatty") {
        text.push(' ');
        text.push_str(follow_up);
    }
    if instruction.contains("emoji") {
        text.push_str(" :)");
    }
    text
}

fn pick<'a, R: Rng>(pool: &'a [&'a str], rng: &mut R) -> &'a str {
    let index = rng.random_range(0..pool.len().max(1));
    pool.get(index).copied().unwrap_or("")
}

/// Uniform random point inside the horizontal circle around `center`.
fn random_point_in_circle<R: Rng>(
    center: &Position,
    radius: f64,
    y: f64,
    rng: &mut R,
) -> Position {
    let angle = rng.random_range(0.0..std::f64::consts::TAU);
    // sqrt keeps the area density uniform instead of clustering at the
    // center.
    let distance = radius.max(0.0) * rng.random_range(0.0_f64..1.0).sqrt();
    Position {
        world: center.world.clone(),
        x: distance.mul_add(angle.cos(), center.x),
        y,
        z: distance.mul_add(angle.sin(), center.z),
    }
}

/// One fixed-length step from `from` toward `target` on the horizontal
/// plane, stopping exactly on the target when it is closer than a step.
fn step_toward(from: &Position, target: &Position, step: f64) -> Position {
    let dx = target.x - from.x;
    let dz = target.z - from.z;
    let distance = dx.hypot(dz);
    if distance <= step || distance <= f64::EPSILON {
        return Position {
            world: from.world.clone(),
            x: target.x,
            y: from.y,
            z: target.z,
        };
    }
    let scale = step / distance;
    Position {
        world: from.world.clone(),
        x: dx.mul_add(scale, from.x),
        y: from.y,
        z: dz.mul_add(scale, from.z),
    }
}
