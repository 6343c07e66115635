//! Per-bot mutable runtime state.
//!
//! Everything a controller needs to remember between ticks lives here
//! as typed fields, owned by the orchestrator and handed to the
//! controller on each decision.

use std::collections::VecDeque;

use botworld_types::Position;

/// Mutable per-bot state threaded through decisions.
#[derive(Debug, Default)]
pub struct BotRuntime {
    /// Where the bot is currently wandering toward, if anywhere.
    pub wander_target: Option<Position>,

    /// Raw text of the last chat line this bot replied to, used to
    /// avoid answering the same line twice.
    pub last_responded_line: Option<String>,

    /// Most recent message per speaker, oldest speaker evicted first.
    speaker_messages: VecDeque<(String, String)>,

    /// Speaker memory capacity.
    speaker_capacity: usize,
}

impl BotRuntime {
    /// Create runtime state remembering at most `speaker_capacity`
    /// speakers' last messages.
    #[must_use]
    pub fn new(speaker_capacity: usize) -> Self {
        Self {
            wander_target: None,
            last_responded_line: None,
            speaker_messages: VecDeque::new(),
            speaker_capacity: speaker_capacity.max(1),
        }
    }

    /// Record the most recent message from a speaker, evicting the
    /// least recently heard speaker when the memory is full.
    pub fn remember_message(&mut self, speaker: &str, message: &str) {
        self.speaker_messages.retain(|(name, _)| name != speaker);
        if self.speaker_messages.len() >= self.speaker_capacity {
            self.speaker_messages.pop_front();
        }
        self.speaker_messages
            .push_back((speaker.to_owned(), message.to_owned()));
    }

    /// Last remembered message from the given speaker.
    #[must_use]
    pub fn last_message_from(&self, speaker: &str) -> Option<&str> {
        self.speaker_messages
            .iter()
            .find(|(name, _)| name == speaker)
            .map(|(_, message)| message.as_str())
    }

    /// Number of speakers currently remembered.
    #[must_use]
    pub fn remembered_speakers(&self) -> usize {
        self.speaker_messages.len()
    }
}
