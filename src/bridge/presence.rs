//! Join/leave debouncing for the game roster.
//!
//! The game drops players from the roster while they sit in camera or
//! cutscene modes. Roster changes are therefore held as pending for a
//! debounce window and only announced if they persist. A matching system
//! chat line ("X has left the game!") confirms a pending change at once.
//! Deaths skip the debounce entirely.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use fancy_regex::Regex;
use tracing::debug;

use crate::common::messages::PlayerStatus;

/// Placeholder the game uses for the player name in system lines.
const PLAYER_NAME_TAG: &str = "<PlayerName/>";

static NOTICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.*?)\s*has (joined|entered|left) the game").unwrap()
});

/// An announcement produced by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Joined(String),
    Left(String),
    Died(String),
}

impl PresenceEvent {
    /// Chat text for this event.
    pub fn announcement(&self) -> String {
        match self {
            Self::Joined(name) => format!("[Server] {} joined the game", name),
            Self::Left(name) => format!("[Server] {} left the game", name),
            Self::Died(name) => format!("[Server] {} died", name),
        }
    }
}

/// Direction of a join/leave system line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Join,
    Leave,
}

/// A parsed "`<name>` has joined/left the game" system line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotice {
    pub player: String,
    pub kind: NoticeKind,
}

impl SystemNotice {
    /// Parse a system line. The player comes from the text unless the text
    /// still carries the name placeholder, in which case the sender is used.
    pub fn parse(sender: &str, text: &str) -> Option<Self> {
        let caps = NOTICE_PATTERN.captures(text).ok()??;

        let named = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let player = if named.is_empty() || named == PLAYER_NAME_TAG {
            sender.trim()
        } else {
            named
        };
        if player.is_empty() {
            return None;
        }

        let kind = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
            "left" => NoticeKind::Leave,
            _ => NoticeKind::Join,
        };

        Some(Self {
            player: player.to_string(),
            kind,
        })
    }
}

/// Whether a system line is a join/leave notice.
pub fn is_join_leave(text: &str) -> bool {
    NOTICE_PATTERN.is_match(text).unwrap_or(false)
}

/// Debounce state machine over roster snapshots.
///
/// A name is in at most one of `pending_joins` / `pending_leaves`.
#[derive(Debug)]
pub struct PresenceTracker {
    debounce: Duration,
    /// Roster as of the previous tick.
    online: HashSet<String>,
    /// Dead flag per name in `online`.
    dead: HashMap<String, bool>,
    pending_joins: HashMap<String, Instant>,
    pending_leaves: HashMap<String, Instant>,
    initialized: bool,
}

impl PresenceTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            online: HashSet::new(),
            dead: HashMap::new(),
            pending_joins: HashMap::new(),
            pending_leaves: HashMap::new(),
            initialized: false,
        }
    }

    /// Feed a roster poll. Returns the announcements due at `now`.
    ///
    /// The first call only records a baseline.
    pub fn observe_roster(&mut self, roster: &[PlayerStatus], now: Instant) -> Vec<PresenceEvent> {
        let current: HashSet<String> = roster.iter().map(|p| p.name.clone()).collect();
        let current_dead: HashMap<String, bool> = roster
            .iter()
            .map(|p| (p.name.clone(), p.is_dead))
            .collect();

        if !self.initialized {
            debug!(players = current.len(), "Presence baseline captured");
            self.online = current;
            self.dead = current_dead;
            self.initialized = true;
            return Vec::new();
        }

        let mut events = Vec::new();

        let mut deaths: Vec<&String> = current_dead
            .iter()
            .filter(|(name, is_dead)| **is_dead && self.dead.get(*name) == Some(&false))
            .map(|(name, _)| name)
            .collect();
        deaths.sort();
        events.extend(deaths.into_iter().map(|name| PresenceEvent::Died(name.clone())));

        for name in current.difference(&self.online) {
            if self.pending_leaves.remove(name).is_some() {
                debug!(player = %name, "Pending leave cancelled");
            } else {
                self.pending_joins.entry(name.clone()).or_insert(now);
            }
        }

        for name in self.online.difference(&current) {
            if self.pending_joins.remove(name).is_some() {
                debug!(player = %name, "Pending join cancelled");
            } else {
                self.pending_leaves.entry(name.clone()).or_insert(now);
            }
        }

        self.online = current;
        self.dead = current_dead;

        events.extend(self.expire(now));
        events
    }

    /// Feed a join/leave system line. Returns the announcement if it
    /// confirms a pending change; `None` means the line should be dropped.
    pub fn confirm(&mut self, notice: &SystemNotice) -> Option<PresenceEvent> {
        match notice.kind {
            NoticeKind::Join => self
                .pending_joins
                .remove(&notice.player)
                .map(|_| PresenceEvent::Joined(notice.player.clone())),
            NoticeKind::Leave => self
                .pending_leaves
                .remove(&notice.player)
                .map(|_| PresenceEvent::Left(notice.player.clone())),
        }
    }

    /// Announce and clear pending entries older than the debounce window.
    fn expire(&mut self, now: Instant) -> Vec<PresenceEvent> {
        let debounce = self.debounce;
        let due = |since: &Instant| now.saturating_duration_since(*since) >= debounce;

        let mut joined: Vec<String> = self
            .pending_joins
            .iter()
            .filter(|(_, since)| due(since))
            .map(|(name, _)| name.clone())
            .collect();
        let mut left: Vec<String> = self
            .pending_leaves
            .iter()
            .filter(|(_, since)| due(since))
            .map(|(name, _)| name.clone())
            .collect();
        joined.sort();
        left.sort();

        for name in &joined {
            self.pending_joins.remove(name);
        }
        for name in &left {
            self.pending_leaves.remove(name);
        }

        joined
            .into_iter()
            .map(PresenceEvent::Joined)
            .chain(left.into_iter().map(PresenceEvent::Left))
            .collect()
    }

    #[cfg(test)]
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending_joins.contains_key(name) || self.pending_leaves.contains_key(name)
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        !self.pending_joins.is_empty() || !self.pending_leaves.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_secs(60);

    fn roster(names: &[&str]) -> Vec<PlayerStatus> {
        names.iter().map(|name| PlayerStatus::alive(*name)).collect()
    }

    fn secs(start: Instant, n: u64) -> Instant {
        start + Duration::from_secs(n)
    }

    #[test]
    fn test_baseline_is_silent() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        assert!(tracker.observe_roster(&roster(&["Alice", "Bob"]), t0).is_empty());
        assert!(tracker.observe_roster(&roster(&["Alice", "Bob"]), secs(t0, 120)).is_empty());
        assert!(!tracker.has_pending());
    }

    #[test]
    fn test_camera_mode_blip_is_silent() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&["Alice"]), t0);
        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 5)).is_empty());
        assert!(tracker.is_pending("Alice"));
        assert!(tracker.observe_roster(&roster(&["Alice"]), secs(t0, 30)).is_empty());

        assert!(!tracker.has_pending());
        assert!(tracker.observe_roster(&roster(&["Alice"]), secs(t0, 200)).is_empty());
    }

    #[test]
    fn test_real_leave_announced_once() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&["Bob"]), t0);
        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 1)).is_empty());
        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 30)).is_empty());

        let events = tracker.observe_roster(&roster(&[]), secs(t0, 62));
        assert_eq!(events, vec![PresenceEvent::Left("Bob".to_string())]);
        assert_eq!(events[0].announcement(), "[Server] Bob left the game");

        assert!(!tracker.has_pending());
        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 200)).is_empty());
    }

    #[test]
    fn test_real_join_announced_once() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&[]), t0);
        assert!(tracker.observe_roster(&roster(&["Charlie"]), secs(t0, 1)).is_empty());

        let events = tracker.observe_roster(&roster(&["Charlie"]), secs(t0, 62));
        assert_eq!(events, vec![PresenceEvent::Joined("Charlie".to_string())]);
        assert_eq!(events[0].announcement(), "[Server] Charlie joined the game");
        assert!(tracker.observe_roster(&roster(&["Charlie"]), secs(t0, 130)).is_empty());
    }

    #[test]
    fn test_unconfirmed_join_then_leave_is_silent() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&[]), t0);
        tracker.observe_roster(&roster(&["Zed"]), secs(t0, 1));
        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 10)).is_empty());

        assert!(!tracker.has_pending());
        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 100)).is_empty());
    }

    #[test]
    fn test_system_confirmed_leave() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&["Dave"]), t0);
        tracker.observe_roster(&roster(&[]), secs(t0, 1));

        let notice = SystemNotice::parse("Dave", "<PlayerName/> has left the game!").unwrap();
        assert_eq!(
            tracker.confirm(&notice),
            Some(PresenceEvent::Left("Dave".to_string()))
        );

        assert!(tracker.observe_roster(&roster(&[]), secs(t0, 70)).is_empty());
    }

    #[test]
    fn test_system_confirmed_join() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&[]), t0);
        tracker.observe_roster(&roster(&["Erin"]), secs(t0, 1));

        let notice = SystemNotice::parse("Server", "Erin has entered the game").unwrap();
        assert_eq!(
            tracker.confirm(&notice),
            Some(PresenceEvent::Joined("Erin".to_string()))
        );
        assert!(tracker.observe_roster(&roster(&["Erin"]), secs(t0, 70)).is_empty());
    }

    #[test]
    fn test_unmatched_notice_suppressed() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();
        tracker.observe_roster(&roster(&["Frank"]), t0);

        let notice = SystemNotice::parse("Frank", "<PlayerName/> has joined the game!").unwrap();
        assert_eq!(tracker.confirm(&notice), None);

        let leave = SystemNotice::parse("Frank", "<PlayerName/> has left the game!").unwrap();
        assert_eq!(tracker.confirm(&leave), None);
    }

    #[test]
    fn test_death_is_immediate() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&["Gina", "Hal"]), t0);
        let events = tracker.observe_roster(
            &[PlayerStatus::dead("Gina"), PlayerStatus::alive("Hal")],
            secs(t0, 1),
        );
        assert_eq!(events, vec![PresenceEvent::Died("Gina".to_string())]);
        assert_eq!(events[0].announcement(), "[Server] Gina died");

        // Still dead on the next tick: no repeat.
        let events = tracker.observe_roster(
            &[PlayerStatus::dead("Gina"), PlayerStatus::alive("Hal")],
            secs(t0, 2),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_death_ignores_pending_state() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&roster(&[]), t0);
        tracker.observe_roster(&roster(&["Ivy"]), secs(t0, 1));
        assert!(tracker.is_pending("Ivy"));

        let events = tracker.observe_roster(&[PlayerStatus::dead("Ivy")], secs(t0, 2));
        assert_eq!(events, vec![PresenceEvent::Died("Ivy".to_string())]);
        assert!(tracker.is_pending("Ivy"));
    }

    #[test]
    fn test_dead_at_baseline_not_announced() {
        let mut tracker = PresenceTracker::new(DEBOUNCE);
        let t0 = Instant::now();

        tracker.observe_roster(&[PlayerStatus::dead("Jo")], t0);
        assert!(tracker
            .observe_roster(&[PlayerStatus::dead("Jo")], secs(t0, 1))
            .is_empty());
    }

    #[test]
    fn test_notice_parsing() {
        assert!(is_join_leave("<PlayerName/> has joined the game!"));
        assert!(is_join_leave("Kim HAS LEFT THE GAME"));
        assert!(!is_join_leave("Kim has left the building"));

        let notice = SystemNotice::parse("Kim", "<PlayerName/> has left the game!").unwrap();
        assert_eq!(notice.player, "Kim");
        assert_eq!(notice.kind, NoticeKind::Leave);

        let notice = SystemNotice::parse("", "Lee has Joined the game!").unwrap();
        assert_eq!(notice.player, "Lee");
        assert_eq!(notice.kind, NoticeKind::Join);

        assert_eq!(SystemNotice::parse("", "has left the game"), None);
        assert_eq!(SystemNotice::parse("Kim", "Welcome back"), None);
    }
}
