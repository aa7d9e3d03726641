//! Named single-slot timers
//!
//! One timer per [`TimerRole`]. Creating a timer for an active role replaces
//! it. Timers are polled from the tick and belong to an epoch: `kill_all`
//! starts a new epoch, and anything fired under an older epoch is dropped.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Fixed set of timer roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerRole {
    /// Repeating ready-command reminder during warmup
    CommandReminder,
    /// Repeating knife vote prompt
    KnifeVoteAnnouncer,
    /// One-shot knife vote deadline
    KnifeVoteTimeout,
    /// One-shot forfeit grace period
    MatchForfeit,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    interval: Duration,
    repeat: bool,
    epoch: u64,
}

/// A timer that came due, tagged with the epoch it was created in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub role: TimerRole,
    pub epoch: u64,
}

/// Registry of active timers keyed by role
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: FxHashMap<TimerRole, Timer>,
    epoch: u64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `role` to fire after `interval`, replacing any timer under that role
    pub fn create(&mut self, role: TimerRole, interval: Duration, repeat: bool, now: Instant) {
        let timer = Timer {
            deadline: now + interval,
            interval,
            repeat,
            epoch: self.epoch,
        };
        if self.timers.insert(role, timer).is_some() {
            tracing::trace!(?role, "Replaced active timer");
        }
    }

    /// Cancel a timer. Returns whether one was active.
    pub fn kill(&mut self, role: TimerRole) -> bool {
        self.timers.remove(&role).is_some()
    }

    /// Cancel every timer and start a new epoch
    pub fn kill_all(&mut self) {
        self.timers.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a fired timer still belongs to the current epoch
    pub fn is_current(&self, fired: FiredTimer) -> bool {
        fired.epoch == self.epoch
    }

    pub fn is_active(&self, role: TimerRole) -> bool {
        self.timers.contains_key(&role)
    }

    /// Time left before `role` fires
    pub fn remaining(&self, role: TimerRole, now: Instant) -> Option<Duration> {
        self.timers
            .get(&role)
            .map(|t| t.deadline.saturating_duration_since(now))
    }

    /// Active roles in a stable order
    pub fn active_roles(&self) -> Vec<TimerRole> {
        let mut roles: Vec<TimerRole> = self.timers.keys().copied().collect();
        roles.sort();
        roles
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Collect due timers. One-shots are removed; repeating timers are
    /// rescheduled (a late tick fires them once, not once per missed interval).
    pub fn poll(&mut self, now: Instant) -> Vec<FiredTimer> {
        let epoch = self.epoch;
        // Leftovers from an older epoch never fire
        self.timers.retain(|_, timer| timer.epoch == epoch);

        let mut fired = Vec::new();
        self.timers.retain(|role, timer| {
            if timer.deadline > now {
                return true;
            }
            fired.push(FiredTimer {
                role: *role,
                epoch: timer.epoch,
            });
            if timer.repeat && !timer.interval.is_zero() {
                timer.deadline += timer.interval;
                if timer.deadline <= now {
                    timer.deadline = now + timer.interval;
                }
                true
            } else {
                false
            }
        });

        fired.sort_by_key(|f| f.role);
        fired
    }
}
