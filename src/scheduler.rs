//! Cooperative timer wheel.
//!
//! Timers are keyed by a closed [`TimerKey`] enum rather than callback
//! pointers, so "retriggering" a timer (re-arming the signal-poll
//! interval, restarting a command's timeout) is a map insert that
//! replaces any existing entry instead of appending a duplicate. The core
//! event loop asks [`Scheduler::wait_duration`] for how long to sleep and
//! calls [`Scheduler::pop_due`] on wake.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Identifies a single logical timer. Extend this as new periodic or
/// one-shot deadlines are added; a duplicate `add` for the same key
/// replaces the previous deadline rather than scheduling a second timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Periodic signal-quality / registration poll.
    SignalPoll,
    /// Periodic Wi-Fi scan trigger.
    WifiScan,
    /// The currently in-flight command's timeout.
    CommandTimeout,
    /// Self-sync shutdown barrier's own timeout.
    SelfSyncTimeout,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: Instant,
    seq: u64,
}

/// A set of named, retriggerable deadlines.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: HashMap<TimerKey, Entry>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) `key` to fire `delay` from now. Replaces any
    /// existing deadline for the same key.
    pub fn arm(&mut self, key: TimerKey, delay: Duration) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            Entry {
                deadline: Instant::now() + delay,
                seq,
            },
        );
    }

    /// Cancel a timer. No-op if it wasn't armed.
    pub fn cancel(&mut self, key: &TimerKey) {
        self.entries.remove(key);
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.entries.contains_key(key)
    }

    /// How long until the earliest deadline, or `None` if nothing is armed.
    pub fn wait_duration(&self) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .values()
            .map(|e| e.deadline.saturating_duration_since(now))
            .min()
    }

    /// Drain every timer whose deadline has passed, earliest (then
    /// lowest-sequence) first, removing them from the schedule.
    pub fn pop_due(&mut self) -> Vec<TimerKey> {
        let now = Instant::now();
        let mut due: Vec<(TimerKey, Entry)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(k, e)| (k.clone(), *e))
            .collect();
        due.sort_by_key(|(_, e)| (e.deadline, e.seq));
        for (key, _) in &due {
            self.entries.remove(key);
        }
        due.into_iter().map(|(k, _)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_a_key_replaces_rather_than_duplicates() {
        let mut s = Scheduler::new();
        s.arm(TimerKey::SignalPoll, Duration::from_millis(10));
        s.arm(TimerKey::SignalPoll, Duration::from_secs(60));
        assert_eq!(s.entries.len(), 1);
    }

    #[test]
    fn pop_due_returns_expired_keys_in_deadline_order() {
        let mut s = Scheduler::new();
        s.arm(TimerKey::CommandTimeout, Duration::from_millis(0));
        s.arm(TimerKey::SelfSyncTimeout, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        let due = s.pop_due();
        assert_eq!(due.len(), 2);
        assert!(s.entries.is_empty());
    }

    #[test]
    fn cancel_removes_an_armed_timer() {
        let mut s = Scheduler::new();
        s.arm(TimerKey::WifiScan, Duration::from_secs(30));
        assert!(s.is_armed(&TimerKey::WifiScan));
        s.cancel(&TimerKey::WifiScan);
        assert!(!s.is_armed(&TimerKey::WifiScan));
    }

    #[test]
    fn wait_duration_is_none_when_nothing_armed() {
        let s = Scheduler::new();
        assert_eq!(s.wait_duration(), None);
    }
}
