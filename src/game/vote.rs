//! Knife vote coordination
//!
//! Collects stay/switch votes from the knife round winners and turns them
//! into a single, write-once side decision.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::game::state::{MatchState, PlayerId, TeamSlot, Vote};

/// Whose votes count toward the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// Decision fires when either option reaches ceil(team size / 2)
    #[default]
    Majority,
    /// Only the winning team's leader votes; their first vote is final
    LeaderOnly,
}

impl FromStr for VotePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "majority" | "quorum" => Ok(VotePolicy::Majority),
            "leader" | "leader_only" => Ok(VotePolicy::LeaderOnly),
            other => Err(format!("unknown vote policy '{}'", other)),
        }
    }
}

/// Why a vote was ignored
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteRejection {
    #[error("Knife vote is not open")]
    VotingClosed,
    #[error("No knife round winner recorded")]
    NoWinner,
    #[error("Side decision already made")]
    AlreadyDecided,
    #[error("Player {0} is not on the winning team")]
    NotOnWinningTeam(PlayerId),
    #[error("Player {0} already voted")]
    AlreadyVoted(PlayerId),
    #[error("Player {0} is not the winning team's leader")]
    NotLeader(PlayerId),
}

/// Vote tally and decision rules for one policy
#[derive(Debug, Clone, Copy)]
pub struct KnifeVoteCoordinator {
    policy: VotePolicy,
}

impl KnifeVoteCoordinator {
    pub fn new(policy: VotePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> VotePolicy {
        self.policy
    }

    /// Votes needed for a decision in a team of `team_size`
    pub fn votes_needed(team_size: usize) -> usize {
        team_size.div_ceil(2).max(1)
    }

    /// Record a vote. First vote wins; later votes by the same player are ignored.
    pub fn cast(
        &self,
        state: &mut MatchState,
        player: PlayerId,
        vote: Vote,
    ) -> Result<(), VoteRejection> {
        let winner = state.knife_winner.ok_or(VoteRejection::NoWinner)?;
        if state.knife_vote_decision.is_some() {
            return Err(VoteRejection::AlreadyDecided);
        }
        if state.team_of(player) != Some(winner) {
            return Err(VoteRejection::NotOnWinningTeam(player));
        }
        if self.policy == VotePolicy::LeaderOnly && state.team(winner).leader() != Some(player) {
            return Err(VoteRejection::NotLeader(player));
        }

        match state.player_mut(player) {
            Some(record) if record.knife_vote.is_none() => {
                record.knife_vote = Some(vote);
                Ok(())
            }
            _ => Err(VoteRejection::AlreadyVoted(player)),
        }
    }

    /// Number of winning-team members who voted `vote`
    pub fn count(state: &MatchState, winner: TeamSlot, vote: Vote) -> usize {
        state
            .team(winner)
            .members()
            .iter()
            .filter_map(|id| state.player(*id))
            .filter(|p| p.knife_vote == Some(vote))
            .count()
    }

    /// Decision the current votes amount to, if any
    pub fn tally(&self, state: &MatchState) -> Option<Vote> {
        let winner = state.knife_winner?;

        match self.policy {
            VotePolicy::LeaderOnly => state
                .team(winner)
                .leader()
                .and_then(|id| state.player(id))
                .and_then(|leader| leader.knife_vote),
            VotePolicy::Majority => {
                let needed = Self::votes_needed(state.team(winner).len());
                [Vote::Stay, Vote::Switch]
                    .into_iter()
                    .find(|vote| Self::count(state, winner, *vote) >= needed)
            }
        }
    }

    /// Record the decision. Returns false if one was already recorded.
    pub fn decide(&self, state: &mut MatchState, decision: Vote) -> bool {
        if state.knife_vote_decision.is_some() {
            return false;
        }
        state.knife_vote_decision = Some(decision);
        true
    }

    /// Apply the recorded decision to the rosters: switch swaps both teams' sides
    pub fn apply(&self, state: &mut MatchState) -> Option<Vote> {
        let decision = state.knife_vote_decision?;
        if decision == Vote::Switch {
            state.swap_starting_sides();
        }
        Some(decision)
    }
}
