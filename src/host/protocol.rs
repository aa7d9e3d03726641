use serde::{Deserialize, Serialize};

use crate::game::state::{Phase, PlayerId, Side, Vote};

/// Return value of veto-capable engine hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookResult {
    /// Let the engine proceed
    Continue,
    /// Block the engine action
    Stop,
}

/// Scoreboard reason code for an overridden round end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    AttackWin,
    DefenseWin,
}

impl RoundEndReason {
    pub fn for_winner(side: Side) -> Self {
        match side {
            Side::Attack => RoundEndReason::AttackWin,
            Side::Defense => RoundEndReason::DefenseWin,
        }
    }

    /// Engine reason code
    pub fn code(self) -> u8 {
        match self {
            RoundEndReason::DefenseWin => 8,
            RoundEndReason::AttackWin => 9,
        }
    }
}

/// Text the host renders, keyed by phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// Warmup reminder of the ready commands
    WarmupCommands { ready: usize, needed: usize },
    /// Knife round is starting
    KnifeRound,
    /// Knife round decided
    KnifeWinner { team: String, side: Side },
    /// Winning team must pick a side
    KnifeVotePrompt { team: String, seconds_left: u64 },
    /// Side decision made
    KnifeVoteDecided { vote: Vote },
    /// Match is live
    MatchLive,
    /// Last human left; match forfeits after the grace period
    ForfeitPending { seconds: u64 },
    /// A human came back before the forfeit fired
    ForfeitCancelled,
    /// Match forfeited, back to warmup
    Forfeited,
}

impl Notice {
    /// Localization key for the host's text system
    pub fn message_key(&self) -> &'static str {
        match self {
            Notice::WarmupCommands { .. } => "match.commands",
            Notice::KnifeRound => "match.knife_round",
            Notice::KnifeWinner { .. } => "match.knife_winner",
            Notice::KnifeVotePrompt { .. } => "match.knife_vote",
            Notice::KnifeVoteDecided { vote: Vote::Stay } => "match.knife_decision_stay",
            Notice::KnifeVoteDecided { vote: Vote::Switch } => "match.knife_decision_switch",
            Notice::MatchLive => "match.live",
            Notice::ForfeitPending { .. } => "match.forfeit_pending",
            Notice::ForfeitCancelled => "match.forfeit_cancelled",
            Notice::Forfeited => "match.forfeited",
        }
    }

    /// Phase the notice belongs to
    pub fn phase(&self) -> Phase {
        match self {
            Notice::WarmupCommands { .. } | Notice::Forfeited => Phase::Warmup,
            Notice::KnifeRound => Phase::Knife,
            Notice::KnifeWinner { .. } => Phase::PreKnifeVote,
            Notice::KnifeVotePrompt { .. } => Phase::KnifeVote,
            Notice::KnifeVoteDecided { .. } => Phase::PreLive,
            Notice::MatchLive | Notice::ForfeitPending { .. } | Notice::ForfeitCancelled => {
                Phase::Live
            }
        }
    }
}

/// Fire-and-forget requests from the core to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// Load warmup settings and (re)start warmup
    StartWarmup,
    /// Load knife-only settings and restart
    StartKnifeRound,
    /// Load competitive settings
    StartLive,
    /// Restart the game after `delay_secs`
    RestartGame { delay_secs: u32 },
    /// Swap every player's engine side
    SwapTeams,
    /// Bot quota for slot filling
    SetBotQuota { quota: usize },
    /// Put a player on an absolute side (None = spectators)
    MovePlayer { player: PlayerId, side: Option<Side> },
    /// Freeze or release player movement
    SetFrozen { frozen: bool },
    /// Remove non-knife items from a player
    StripWeapons { player: PlayerId },
    /// Replace the scoreboard result of the round that just ended
    OverrideRoundEnd {
        winner: Side,
        reason: RoundEndReason,
        message_key: &'static str,
    },
    /// Scoreboard clan tag (localization key)
    SetClanTag { player: PlayerId, label_key: &'static str },
    /// Chat announcement
    Announce(Notice),
    /// Centre-screen banner
    CenterBanner(Notice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(RoundEndReason::for_winner(Side::Attack).code(), 9);
        assert_eq!(RoundEndReason::for_winner(Side::Defense).code(), 8);
    }

    #[test]
    fn test_notice_keys_and_phases() {
        let notice = Notice::KnifeVoteDecided { vote: Vote::Switch };
        assert_eq!(notice.message_key(), "match.knife_decision_switch");
        assert_eq!(notice.phase(), Phase::PreLive);
        assert_eq!(Notice::Forfeited.phase(), Phase::Warmup);
    }

    #[test]
    fn test_notice_json() {
        let notice = Notice::KnifeWinner {
            team: "team_alice".to_string(),
            side: Side::Defense,
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["notice"], "knife_winner");
        assert_eq!(json["team"], "team_alice");
        assert_eq!(json["side"], "defense");

        let back: Notice = serde_json::from_value(json).unwrap();
        assert_eq!(back, notice);
    }

    #[test]
    fn test_command_json() {
        let command = HostCommand::MovePlayer {
            player: 5,
            side: None,
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["command"], "move_player");
        assert!(json["side"].is_null());
    }
}
