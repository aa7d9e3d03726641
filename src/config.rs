use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::game::constants::{roster, timing};
use crate::game::state::PlayerId;
use crate::game::vote::VotePolicy;

/// When the knife vote opens after the knife round ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStart {
    /// Announce the winner, open the vote on the next round start
    #[default]
    NextRound,
    /// Open the vote as soon as the scoreboard override is sent
    RoundEnd,
}

impl FromStr for VoteStart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "next_round" | "round_start" => Ok(VoteStart::NextRound),
            "round_end" | "immediate" => Ok(VoteStart::RoundEnd),
            other => Err(format!("unknown vote start '{}'", other)),
        }
    }
}

/// Match configuration
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Ready players (both teams) required to start
    pub match_size: usize,
    /// Whose knife votes count
    pub vote_policy: VotePolicy,
    /// When the knife vote opens
    pub vote_start: VoteStart,
    /// Fill vacant slots with bots
    pub bot_fill: bool,
    /// Restrict team joins to `whitelist`
    pub whitelist_enabled: bool,
    pub whitelist: HashSet<PlayerId>,
    /// Seed for the coin-flip tie-break (random when unset)
    pub seed: Option<u64>,
    pub announce_interval: Duration,
    pub vote_timeout: Duration,
    pub forfeit_grace: Duration,
    pub banner_window: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_size: roster::DEFAULT_MATCH_SIZE,
            vote_policy: VotePolicy::Majority,
            vote_start: VoteStart::NextRound,
            bot_fill: true,
            whitelist_enabled: false,
            whitelist: HashSet::new(),
            seed: None,
            announce_interval: timing::ANNOUNCE_INTERVAL,
            vote_timeout: timing::KNIFE_VOTE_TIMEOUT,
            forfeit_grace: timing::FORFEIT_GRACE,
            banner_window: timing::PHASE_BANNER_WINDOW,
        }
    }
}

impl MatchConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("MATCH_MAX_PLAYERS") {
            match size.parse::<usize>() {
                Ok(parsed) if (roster::MIN_MATCH_SIZE..=roster::MAX_MATCH_SIZE).contains(&parsed) => {
                    config.match_size = parsed;
                }
                Ok(_) => tracing::warn!(
                    "MATCH_MAX_PLAYERS must be {}-{}, using default",
                    roster::MIN_MATCH_SIZE,
                    roster::MAX_MATCH_SIZE
                ),
                Err(_) => tracing::warn!("Invalid MATCH_MAX_PLAYERS '{}', using default", size),
            }
        }

        if let Ok(policy) = std::env::var("MATCH_VOTE_POLICY") {
            match policy.parse() {
                Ok(parsed) => config.vote_policy = parsed,
                Err(e) => tracing::warn!("Invalid MATCH_VOTE_POLICY: {}, using default", e),
            }
        }

        if let Ok(start) = std::env::var("MATCH_KNIFE_VOTE_START") {
            match start.parse() {
                Ok(parsed) => config.vote_start = parsed,
                Err(e) => tracing::warn!("Invalid MATCH_KNIFE_VOTE_START: {}, using default", e),
            }
        }

        if let Ok(fill) = std::env::var("MATCH_BOT_FILL") {
            match parse_flag(&fill) {
                Some(parsed) => config.bot_fill = parsed,
                None => tracing::warn!("Invalid MATCH_BOT_FILL '{}', using default", fill),
            }
        }

        if let Ok(list) = std::env::var("MATCH_WHITELIST") {
            config.whitelist = parse_whitelist(&list);
            config.whitelist_enabled = !config.whitelist.is_empty();
        }

        if let Ok(seed) = std::env::var("MATCH_SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.seed = Some(parsed);
            } else {
                tracing::warn!("Invalid MATCH_SEED '{}', using random seed", seed);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.match_size < roster::MIN_MATCH_SIZE {
            return Err(format!("match_size must be at least {}", roster::MIN_MATCH_SIZE));
        }
        if self.match_size > roster::MAX_MATCH_SIZE {
            return Err(format!("match_size cannot exceed {}", roster::MAX_MATCH_SIZE));
        }
        if self.vote_timeout.is_zero() {
            return Err("vote_timeout must be non-zero".to_string());
        }
        if self.announce_interval.is_zero() {
            return Err("announce_interval must be non-zero".to_string());
        }
        if self.whitelist_enabled && self.whitelist.is_empty() {
            return Err("whitelist is enabled but empty".to_string());
        }
        Ok(())
    }

    /// Roster cap for one team during warmup
    pub fn team_capacity(&self) -> usize {
        self.match_size.div_ceil(2)
    }

    /// Whether a player may join a team
    pub fn is_allowed(&self, player: PlayerId) -> bool {
        !self.whitelist_enabled || self.whitelist.contains(&player)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_whitelist(list: &str) -> HashSet<PlayerId> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<PlayerId>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Ignoring invalid whitelist entry '{}'", entry);
                None
            }
        })
        .collect()
}
