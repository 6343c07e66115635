//! The shared, bounded, thread-safe chat log.
//!
//! One [`ChatLog`] instance is shared by the tick orchestrator, every
//! controller, and the engagement scheduler. All mutation happens under
//! a single mutex; the activity markers the scheduler polls are atomics
//! so reads never contend with writers.
//!
//! Sequence numbers are strictly increasing for the lifetime of the log
//! and are the authoritative ordering key -- timestamps can tie or go
//! backward when completions land from worker threads.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use botworld_types::{BotId, ChatEntry, SenderClass};

use crate::sanitize::sanitize_outgoing;

/// Where accepted bot speech is emitted.
///
/// Implemented by the hosting layer (chat broadcast). Implementations
/// must tolerate being called after world teardown by no-op'ing.
pub trait ChatSink: Send + Sync {
    /// Broadcast a sanitized message on behalf of a bot.
    fn broadcast(&self, bot_name: &str, message: &str);
}

/// State guarded by the log's single mutex.
struct LogInner {
    entries: VecDeque<ChatEntry>,
    max_size: usize,
    rate_limit_ms: u64,
    /// Per-bot wall-clock of the last accepted outbound message.
    last_sent_ms: HashMap<BotId, u64>,
    sequence: u64,
}

/// Bounded ring buffer of chat events with rate-limited outbound send.
pub struct ChatLog {
    inner: Mutex<LogInner>,
    /// Wall-clock of the most recent recorded entry, any sender class.
    last_update_ms: AtomicU64,
    /// Wall-clock of the most recent player-class entry.
    last_player_update_ms: AtomicU64,
    /// Sequence of the most recent player-class entry.
    last_player_sequence: AtomicU64,
}

impl ChatLog {
    /// Create a log holding at most `max_size` entries, with a per-bot
    /// minimum interval of `rate_limit_ms` between outbound messages.
    pub fn new(max_size: usize, rate_limit_ms: u64) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: VecDeque::new(),
                max_size: max_size.max(1),
                rate_limit_ms,
                last_sent_ms: HashMap::new(),
                sequence: 0,
            }),
            last_update_ms: AtomicU64::new(0),
            last_player_update_ms: AtomicU64::new(0),
            last_player_sequence: AtomicU64::new(0),
        }
    }

    /// Record a chat event, evicting the oldest entry on overflow.
    pub fn record(&self, sender: &str, message: &str, class: SenderClass) {
        self.record_at(sender, message, class, wall_clock_ms());
    }

    /// Record a raw `"sender: message"` line with no known author class.
    pub fn record_line(&self, raw_line: &str) {
        let probe = ChatEntry::from_line(raw_line, 0);
        self.record(&probe.sender, &probe.message, SenderClass::Unknown);
    }

    /// Record with an explicit timestamp. The sequence number is always
    /// minted fresh under the lock regardless of the caller's clock.
    fn record_at(&self, sender: &str, message: &str, class: SenderClass, now_ms: u64) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!("chat log lock poisoned, dropping entry");
            return;
        };
        if inner.entries.len() >= inner.max_size {
            inner.entries.pop_front();
        }
        inner.sequence = inner.sequence.saturating_add(1);
        let sequence = inner.sequence;
        let entry = ChatEntry::from_parts(sender, message, class, now_ms, sequence);
        debug!(sender = entry.sender, sequence, "recorded chat message");
        inner.entries.push_back(entry);
        drop(inner);
        self.last_update_ms.store(now_ms, Ordering::Release);
        if class == SenderClass::Player {
            self.last_player_update_ms.store(now_ms, Ordering::Release);
            self.last_player_sequence.store(sequence, Ordering::Release);
        }
    }

    /// Immutable ordered copy of the log, oldest first.
    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.inner
            .lock()
            .map(|inner| inner.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw `"sender: message"` lines, oldest first.
    pub fn raw_lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.entries.iter().map(|e| e.raw_line.clone()).collect())
            .unwrap_or_default()
    }

    /// Sanitize and emit a bot message, then record it.
    ///
    /// A message is emitted only if it survives sanitization and the
    /// bot's minimum resend interval has elapsed. Recording happens
    /// after emission so the log only ever reflects speech that actually
    /// reached the world. Returns whether the message was emitted.
    pub fn send_bot_message(
        &self,
        bot_id: BotId,
        bot_name: &str,
        message: &str,
        sink: &dyn ChatSink,
    ) -> bool {
        self.send_bot_message_at(bot_id, bot_name, message, sink, wall_clock_ms())
    }

    fn send_bot_message_at(
        &self,
        bot_id: BotId,
        bot_name: &str,
        message: &str,
        sink: &dyn ChatSink,
        now_ms: u64,
    ) -> bool {
        let sanitized = sanitize_outgoing(message);
        if sanitized.is_empty() {
            return false;
        }
        {
            let Ok(mut inner) = self.inner.lock() else {
                warn!("chat log lock poisoned, dropping outbound message");
                return false;
            };
            let last = inner.last_sent_ms.get(&bot_id).copied().unwrap_or(0);
            if now_ms.saturating_sub(last) < inner.rate_limit_ms && last != 0 {
                debug!(bot = bot_name, "outbound chat dropped by rate limit");
                return false;
            }
            inner.last_sent_ms.insert(bot_id, now_ms);
        }
        sink.broadcast(bot_name, &sanitized);
        self.record_at(bot_name, &sanitized, SenderClass::Bot, now_ms);
        debug!(bot = bot_name, message = sanitized, "bot chat emitted");
        true
    }

    /// Hot-reload the size bound and outbound rate limit, trimming
    /// overflow from the oldest end.
    pub fn update_settings(&self, max_size: usize, rate_limit_ms: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.max_size = max_size.max(1);
            inner.rate_limit_ms = rate_limit_ms;
            while inner.entries.len() > inner.max_size {
                inner.entries.pop_front();
            }
        }
    }

    /// Wall-clock milliseconds of the most recent recorded entry.
    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms.load(Ordering::Acquire)
    }

    /// Wall-clock milliseconds of the most recent player-class entry.
    pub fn last_player_update_ms(&self) -> u64 {
        self.last_player_update_ms.load(Ordering::Acquire)
    }

    /// Sequence number of the most recent player-class entry.
    pub fn last_player_sequence(&self) -> u64 {
        self.last_player_sequence.load(Ordering::Acquire)
    }
}

/// Current wall clock in whole milliseconds since the epoch.
fn wall_clock_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Sink that counts broadcasts and remembers the last message.
    #[derive(Default)]
    struct RecordingSink {
        broadcasts: AtomicUsize,
        last: Mutex<Option<(String, String)>>,
    }

    impl ChatSink for RecordingSink {
        fn broadcast(&self, bot_name: &str, message: &str) {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last.lock() {
                *last = Some((bot_name.to_owned(), message.to_owned()));
            }
        }
    }

    #[test]
    fn log_never_exceeds_max_size() {
        let log = ChatLog::new(3, 0);
        for i in 0..10 {
            log.record(&format!("p{i}"), "hi", SenderClass::Player);
        }
        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        // Oldest evicted; the survivors are the last three.
        assert_eq!(entries.first().unwrap().sender, "p7");
    }

    #[test]
    fn sequences_strictly_increase() {
        let log = ChatLog::new(2, 0);
        for i in 0..6 {
            log.record(&format!("p{i}"), "x", SenderClass::Player);
        }
        let entries = log.snapshot();
        let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![5, 6]);
    }

    #[test]
    fn sequences_increase_under_concurrent_recording() {
        let log = Arc::new(ChatLog::new(1000, 0));
        let mut handles = Vec::new();
        for t in 0..4 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    log.record(&format!("t{t}"), &format!("m{i}"), SenderClass::Player);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let entries = log.snapshot();
        assert_eq!(entries.len(), 200);
        for pair in entries.windows(2) {
            if let [a, b] = pair {
                assert!(b.sequence > a.sequence);
            }
        }
    }

    #[test]
    fn player_marker_ignores_bot_entries() {
        let log = ChatLog::new(10, 0);
        log.record_at("Bolek", "hi", SenderClass::Bot, 100);
        assert_eq!(log.last_update_ms(), 100);
        assert_eq!(log.last_player_update_ms(), 0);
        log.record_at("Steve", "yo", SenderClass::Player, 200);
        assert_eq!(log.last_player_update_ms(), 200);
    }

    #[test]
    fn send_emits_then_records() {
        let log = ChatLog::new(10, 0);
        let sink = RecordingSink::default();
        let id = BotId::new();
        assert!(log.send_bot_message_at(id, "Bolek", " hello ", &sink, 50));
        assert_eq!(sink.broadcasts.load(Ordering::SeqCst), 1);
        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        let entry = entries.first().unwrap();
        assert_eq!(entry.sender_class, SenderClass::Bot);
        assert_eq!(entry.message, "hello");
    }

    #[test]
    fn send_respects_rate_limit() {
        let log = ChatLog::new(10, 1000);
        let sink = RecordingSink::default();
        let id = BotId::new();
        assert!(log.send_bot_message_at(id, "Bolek", "one", &sink, 1_000));
        assert!(!log.send_bot_message_at(id, "Bolek", "two", &sink, 1_500));
        assert!(log.send_bot_message_at(id, "Bolek", "three", &sink, 2_100));
        assert_eq!(sink.broadcasts.load(Ordering::SeqCst), 2);
        // The suppressed message never entered the log.
        assert_eq!(log.snapshot().len(), 2);
    }

    #[test]
    fn rate_limit_is_per_bot() {
        let log = ChatLog::new(10, 1000);
        let sink = RecordingSink::default();
        assert!(log.send_bot_message_at(BotId::new(), "Bolek", "a", &sink, 1_000));
        assert!(log.send_bot_message_at(BotId::new(), "Lolek", "b", &sink, 1_001));
    }

    #[test]
    fn sanitized_to_blank_is_not_emitted() {
        let log = ChatLog::new(10, 0);
        let sink = RecordingSink::default();
        assert!(!log.send_bot_message_at(BotId::new(), "Bolek", "__SILENCE__", &sink, 10));
        assert_eq!(sink.broadcasts.load(Ordering::SeqCst), 0);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn update_settings_trims_overflow() {
        let log = ChatLog::new(10, 0);
        for i in 0..8 {
            log.record(&format!("p{i}"), "x", SenderClass::Player);
        }
        log.update_settings(4, 0);
        assert_eq!(log.snapshot().len(), 4);
    }

    #[test]
    fn record_line_parses_sender() {
        let log = ChatLog::new(10, 0);
        log.record_line("Steve: hello there");
        let entries = log.snapshot();
        let entry = entries.first().unwrap();
        assert_eq!(entry.sender, "Steve");
        assert_eq!(entry.sender_class, SenderClass::Unknown);
    }
}
