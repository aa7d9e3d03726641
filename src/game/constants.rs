/// Timing constants for timers and time-windowed behavior
pub mod timing {
    use std::time::Duration;

    /// Interval between repeated chat announcements (ready commands, vote prompt)
    pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(15);
    /// How long the winning team has to decide before "stay" is forced
    pub const KNIFE_VOTE_TIMEOUT: Duration = Duration::from_secs(120);
    /// Grace period before a match with no connected humans is forfeited
    pub const FORFEIT_GRACE: Duration = Duration::from_secs(60);
    /// Centre banner is shown for this long after entering Knife or Live
    pub const PHASE_BANNER_WINDOW: Duration = Duration::from_secs(10);
    /// Delay passed to the engine's restart-game action when going live
    pub const LIVE_RESTART_DELAY_SECS: u32 = 1;
}

/// Match composition defaults
pub mod roster {
    /// Default number of players (both teams) required to start
    pub const DEFAULT_MATCH_SIZE: usize = 10;
    /// Smallest match size accepted by config validation
    pub const MIN_MATCH_SIZE: usize = 2;
    /// Largest match size accepted by config validation
    pub const MAX_MATCH_SIZE: usize = 64;
    /// Prefix of a team's display name, followed by the leader's name
    pub const TEAM_NAME_PREFIX: &str = "team_";
}

/// Engine round rules used when the engine does not say otherwise
pub mod rules {
    /// Regulation round cap (mp_maxrounds)
    pub const DEFAULT_MAX_ROUNDS: u32 = 24;
    /// Overtime round cap (mp_overtime_maxrounds)
    pub const DEFAULT_OVERTIME_MAX_ROUNDS: u32 = 6;
}

/// Item names treated as knives during the knife round
pub mod items {
    /// Substrings that identify a melee item
    pub const KNIFE_MARKERS: [&str; 2] = ["knife", "bayonet"];

    /// Whether an engine item name is a knife
    pub fn is_knife(item: &str) -> bool {
        let item = item.to_ascii_lowercase();
        KNIFE_MARKERS.iter().any(|marker| item.contains(marker))
    }
}

/// Localization keys handed to the host for labels and messages
pub mod keys {
    pub const READY_LABEL: &str = "match.ready";
    pub const NOT_READY_LABEL: &str = "match.not_ready";
    pub const KNIFE_WINNER_MESSAGE: &str = "match.knife_winner";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_knife() {
        assert!(items::is_knife("weapon_knife"));
        assert!(items::is_knife("weapon_knife_t"));
        assert!(items::is_knife("weapon_BAYONET"));
        assert!(!items::is_knife("weapon_ak47"));
        assert!(!items::is_knife("item_kevlar"));
    }

    #[test]
    fn test_timing_relationships() {
        assert!(timing::ANNOUNCE_INTERVAL < timing::KNIFE_VOTE_TIMEOUT);
        assert!(timing::PHASE_BANNER_WINDOW < timing::FORFEIT_GRACE);
    }
}
