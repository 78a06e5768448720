//! Bridge state management.
//!
//! Holds the mutable state shared by the polling loops:
//! - `SeenTimestamps`: inbound Signal message ids already handled
//! - `SentToGame`: fingerprints of messages the bridge pushed into game chat
//! - `BridgeState`: the two above plus the game feed watermark and presence
//!
//! All of it sits behind one lock owned by the orchestrator. The lock is
//! taken per processed item and released before any network call.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::bridge::presence::PresenceTracker;

/// Bounded set of inbound message timestamps.
///
/// On overflow only the newest half survives. Signal timestamps grow
/// monotonically, so the largest ids are the most recent ones.
#[derive(Debug)]
pub struct SeenTimestamps {
    ids: HashSet<i64>,
    capacity: usize,
}

impl SeenTimestamps {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity + 1),
            capacity: capacity.max(2),
        }
    }

    pub fn has_seen(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn mark_seen(&mut self, id: i64) {
        self.ids.insert(id);
        if self.ids.len() > self.capacity {
            let mut sorted: Vec<i64> = self.ids.drain().collect();
            sorted.sort_unstable();
            let keep = self.capacity / 2;
            self.ids.extend(sorted.split_off(sorted.len() - keep));
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Build the echo fingerprint for a message.
pub fn fingerprint(sender: &str, text: &str) -> String {
    format!("{}:{}", sender, text)
}

/// Insertion-ordered fingerprints of messages sent into game chat.
///
/// Duplicates are kept: two identical sends expect two echoes.
#[derive(Debug)]
pub struct SentToGame {
    entries: VecDeque<String>,
    capacity: usize,
}

impl SentToGame {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(2),
        }
    }

    /// Remember a message about to be sent. Drops the oldest half on overflow.
    pub fn mark_sent(&mut self, sender: &str, text: &str) {
        self.entries.push_back(fingerprint(sender, text));
        if self.entries.len() > self.capacity {
            self.entries.drain(..self.capacity / 2);
        }
    }

    /// Consume the oldest matching fingerprint. Returns true if the game
    /// line is an echo of something the bridge sent.
    pub fn consume_echo(&mut self, sender: &str, text: &str) -> bool {
        let key = fingerprint(sender, text);
        match self.entries.iter().position(|entry| *entry == key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Withdraw the newest matching fingerprint after a failed send.
    pub fn retract(&mut self, sender: &str, text: &str) {
        let key = fingerprint(sender, text);
        if let Some(index) = self.entries.iter().rposition(|entry| *entry == key) {
            self.entries.remove(index);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the polling loops share.
#[derive(Debug)]
pub struct BridgeState {
    /// Highest game `ServerTimeStamp` already processed.
    pub watermark: f64,
    pub seen: SeenTimestamps,
    pub sent_to_game: SentToGame,
    pub presence: PresenceTracker,
}

impl BridgeState {
    pub fn new(seen_capacity: usize, sent_capacity: usize, debounce: Duration) -> Self {
        Self {
            watermark: 0.0,
            seen: SeenTimestamps::new(seen_capacity),
            sent_to_game: SentToGame::new(sent_capacity),
            presence: PresenceTracker::new(debounce),
        }
    }

    /// Advance the watermark; it never moves backwards.
    pub fn advance_watermark(&mut self, server_timestamp: f64) {
        if server_timestamp > self.watermark {
            self.watermark = server_timestamp;
        }
    }
}
