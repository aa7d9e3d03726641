//! Forfeit watchdog
//!
//! Arms a grace timer when the last connected human leaves a running match
//! and disarms it when a rostered human comes back.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::game::state::{Phase, PlayerId};
use crate::game::timers::{TimerRegistry, TimerRole};

/// What the watchdog did in response to a connection change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Grace timer scheduled
    Armed,
    /// Grace timer was already running and keeps its deadline
    AlreadyArmed,
    /// Pending forfeit cancelled
    Disarmed,
    /// Nothing to do
    Idle,
}

#[derive(Debug, Clone, Copy)]
pub struct ForfeitWatchdog {
    grace: Duration,
}

impl ForfeitWatchdog {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// A player left. `humans_remaining` excludes the leaving player and bots.
    pub fn on_disconnect(
        &self,
        phase: Phase,
        leaving: PlayerId,
        humans_remaining: usize,
        timers: &mut TimerRegistry,
        now: Instant,
    ) -> WatchdogAction {
        if phase == Phase::Warmup || humans_remaining > 0 {
            return WatchdogAction::Idle;
        }
        if timers.is_active(TimerRole::MatchForfeit) {
            return WatchdogAction::AlreadyArmed;
        }

        timers.create(TimerRole::MatchForfeit, self.grace, false, now);
        warn!(
            player = leaving,
            grace_secs = self.grace.as_secs(),
            "Last human left, forfeit pending"
        );
        WatchdogAction::Armed
    }

    /// A rostered human reconnected
    pub fn on_reconnect(&self, player: PlayerId, timers: &mut TimerRegistry) -> WatchdogAction {
        if timers.kill(TimerRole::MatchForfeit) {
            info!(player, "Human reconnected, forfeit cancelled");
            WatchdogAction::Disarmed
        } else {
            WatchdogAction::Idle
        }
    }

    /// Time left before the forfeit fires, if armed
    pub fn remaining(&self, timers: &TimerRegistry, now: Instant) -> Option<Duration> {
        timers.remaining(TimerRole::MatchForfeit, now)
    }
}
