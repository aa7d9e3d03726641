//! Prometheus-compatible match counters
//!
//! Counters are plain atomics so the harness can render them from another
//! task while the session keeps running.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::game::state::Phase;

/// Counters for one match session
#[derive(Debug)]
pub struct MatchMetrics {
    pub matches_started: AtomicU64,
    pub knife_rounds_decided: AtomicU64,
    pub votes_accepted: AtomicU64,
    pub lives_started: AtomicU64,
    pub forfeits: AtomicU64,
    pub warmup_resets: AtomicU64,
    pub hook_errors: AtomicU64,

    // Server uptime
    start_time: Instant,

    // Last phase seen, for the state label
    phase: RwLock<Phase>,
}

impl MatchMetrics {
    pub fn new() -> Self {
        Self {
            matches_started: AtomicU64::new(0),
            knife_rounds_decided: AtomicU64::new(0),
            votes_accepted: AtomicU64::new(0),
            lives_started: AtomicU64::new(0),
            forfeits: AtomicU64::new(0),
            warmup_resets: AtomicU64::new(0),
            hook_errors: AtomicU64::new(0),
            start_time: Instant::now(),
            phase: RwLock::new(Phase::Warmup),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn set_phase(&self, phase: Phase) {
        *self.phase.write() = phase;
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn render(&self) -> String {
        let mut output = String::with_capacity(1024);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("match_started_total", "Matches started (warmup to knife)", "counter",
            Self::get(&self.matches_started));
        metric!("match_knife_rounds_decided_total", "Knife rounds with an evaluated winner", "counter",
            Self::get(&self.knife_rounds_decided));
        metric!("match_knife_votes_accepted_total", "Stay/switch votes recorded", "counter",
            Self::get(&self.votes_accepted));
        metric!("match_lives_started_total", "Side decisions applied", "counter",
            Self::get(&self.lives_started));
        metric!("match_forfeits_total", "Matches ended by forfeit", "counter",
            Self::get(&self.forfeits));
        metric!("match_warmup_resets_total", "Full resets to warmup", "counter",
            Self::get(&self.warmup_resets));
        metric!("match_hook_errors_total", "Engine hook failures caught at the hook boundary", "counter",
            Self::get(&self.hook_errors));
        metric!("match_uptime_seconds", "Session uptime in seconds", "counter",
            self.uptime_seconds());

        let phase = serde_json::to_value(self.phase())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        output.push_str(&format!(
            "# HELP match_phase Current match phase\n# TYPE match_phase gauge\nmatch_phase{{phase=\"{}\"}} 1\n",
            phase
        ));

        output
    }
}

impl Default for MatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = MatchMetrics::new();
        assert_eq!(MatchMetrics::get(&metrics.matches_started), 0);
        assert_eq!(metrics.phase(), Phase::Warmup);
    }

    #[test]
    fn test_incr() {
        let metrics = MatchMetrics::new();
        MatchMetrics::incr(&metrics.forfeits);
        MatchMetrics::incr(&metrics.forfeits);
        assert_eq!(MatchMetrics::get(&metrics.forfeits), 2);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MatchMetrics::new();
        MatchMetrics::incr(&metrics.votes_accepted);
        metrics.set_phase(Phase::KnifeVote);

        let output = metrics.render();
        assert!(output.contains("match_knife_votes_accepted_total 1"));
        assert!(output.contains("match_forfeits_total 0"));
        assert!(output.contains("match_phase{phase=\"knife_vote\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
