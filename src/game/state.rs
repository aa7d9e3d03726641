//! Match state definitions and structures
//!
//! Players live in one id-indexed arena owned by [`MatchState`]; each team
//! keeps an ordered list of member ids. Team membership is always resolved
//! through the arena, so removing a player can never leave a dangling leader.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::game::constants::roster::TEAM_NAME_PREFIX;

/// Stable player identifier (survives reconnects within a match)
pub type PlayerId = u64;

/// One of the two opposing in-game sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attack,
    Defense,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Attack, Side::Defense];

    pub fn opposite(self) -> Self {
        match self {
            Side::Attack => Side::Defense,
            Side::Defense => Side::Attack,
        }
    }
}

/// Match lifecycle phase, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Players join, leave and ready up
    #[default]
    Warmup,
    /// The tie-break knife round is being played
    Knife,
    /// Knife round decided, waiting for the next round to open the vote
    PreKnifeVote,
    /// Winning team is choosing stay/switch
    KnifeVote,
    /// Sides applied, waiting for the restarted round
    PreLive,
    /// Competitive match in progress
    Live,
}

impl Phase {
    /// Team changes are only allowed before the match starts
    pub fn rosters_locked(self) -> bool {
        self != Phase::Warmup
    }
}

/// Side vote cast by the knife round winners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Stay,
    Switch,
}

/// Index of one of the two match teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSlot {
    First,
    Second,
}

impl TeamSlot {
    pub const ALL: [TeamSlot; 2] = [TeamSlot::First, TeamSlot::Second];

    fn index(self) -> usize {
        match self {
            TeamSlot::First => 0,
            TeamSlot::Second => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            TeamSlot::First => TeamSlot::Second,
            TeamSlot::Second => TeamSlot::First,
        }
    }
}

/// Match errors (invariant violations and missing engine dependencies)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Player {0} is not on a match team")]
    NotOnTeam(PlayerId),
    #[error("Knife round has no recorded winner")]
    NoKnifeWinner,
    #[error("Engine round rules unavailable")]
    RoundRulesUnavailable,
    #[error("Engine round limits unavailable")]
    RoundLimitsUnavailable,
    #[error("Invalid overtime round limit: {0}")]
    InvalidOvertimeLimit(u32),
}

/// Per-player match record
#[derive(Debug, Clone, Serialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub display_name: String,
    pub team: TeamSlot,
    pub is_ready: bool,
    /// Side the player started the match on (set when the match starts)
    pub starting_side: Option<Side>,
    pub knife_vote: Option<Vote>,
}

impl PlayerState {
    pub fn new(id: PlayerId, display_name: String, team: TeamSlot) -> Self {
        Self {
            id,
            display_name,
            team,
            is_ready: false,
            starting_side: None,
            knife_vote: None,
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.is_ready = ready;
    }
}

/// Team roster: ordered members, leader and contractual starting side
#[derive(Debug, Clone)]
pub struct TeamState {
    pub starting_side: Side,
    leader: Option<PlayerId>,
    members: SmallVec<[PlayerId; 8]>,
}

impl TeamState {
    pub fn new(starting_side: Side) -> Self {
        Self {
            starting_side,
            leader: None,
            members: SmallVec::new(),
        }
    }

    pub fn leader(&self) -> Option<PlayerId> {
        self.leader
    }

    /// Members in join order
    pub fn members(&self) -> &[PlayerId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.members.contains(&id)
    }

    fn add_member(&mut self, id: PlayerId) {
        if !self.contains(id) {
            self.members.push(id);
        }
        if self.leader.is_none() {
            self.leader = Some(id);
        }
    }

    fn remove_member(&mut self, id: PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != id);
        if self.leader == Some(id) {
            // Earliest remaining joiner takes over
            self.leader = self.members.first().copied();
        }
        self.members.len() != before
    }
}

/// Team view for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct TeamStatus {
    pub slot: TeamSlot,
    pub name: String,
    pub starting_side: Side,
    pub leader: Option<PlayerId>,
    pub members: Vec<PlayerId>,
}

/// Root aggregate for one match, rebuilt from scratch on every warmup
#[derive(Debug, Clone)]
pub struct MatchState {
    /// Unique per warmup; identifies the match epoch in logs
    pub id: Uuid,
    pub phase: Phase,
    pub phase_entered_at: Instant,
    pub knife_winner: Option<TeamSlot>,
    pub knife_vote_decision: Option<Vote>,
    teams: [TeamState; 2],
    players: HashMap<PlayerId, PlayerState>,
}

impl MatchState {
    pub fn new(now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Warmup,
            phase_entered_at: now,
            knife_winner: None,
            knife_vote_decision: None,
            teams: [TeamState::new(Side::Attack), TeamState::new(Side::Defense)],
            players: HashMap::new(),
        }
    }

    /// Enter a phase, recording the entry time. Returns false if already there.
    pub fn set_phase(&mut self, phase: Phase, now: Instant) -> bool {
        if self.phase == phase {
            return false;
        }
        self.phase = phase;
        self.phase_entered_at = now;
        true
    }

    pub fn time_in_phase(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_entered_at)
    }

    pub fn team(&self, slot: TeamSlot) -> &TeamState {
        &self.teams[slot.index()]
    }

    fn team_mut(&mut self, slot: TeamSlot) -> &mut TeamState {
        &mut self.teams[slot.index()]
    }

    /// The team whose starting side is `side` (sides are always complementary)
    pub fn slot_for_side(&self, side: Side) -> TeamSlot {
        if self.teams[0].starting_side == side {
            TeamSlot::First
        } else {
            TeamSlot::Second
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn contains_player(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn team_of(&self, id: PlayerId) -> Option<TeamSlot> {
        self.players.get(&id).map(|p| p.team)
    }

    /// Team lookup for a player the caller believes is in the match
    pub fn require_team_of(&self, id: PlayerId) -> Result<TeamSlot, MatchError> {
        self.team_of(id).ok_or(MatchError::NotOnTeam(id))
    }

    /// Look up a player, or add them to the team on their current engine side.
    ///
    /// Returns `None` for an unknown player with no engine side (spectator).
    pub fn get_or_create_player(
        &mut self,
        id: PlayerId,
        display_name: &str,
        engine_side: Option<Side>,
    ) -> Option<&mut PlayerState> {
        if !self.players.contains_key(&id) {
            let slot = self.slot_for_side(engine_side?);
            self.players
                .insert(id, PlayerState::new(id, display_name.to_string(), slot));
            self.team_mut(slot).add_member(id);
        }
        self.players.get_mut(&id)
    }

    /// Place a player on the team for `side`, moving them if needed.
    ///
    /// Moving between teams clears readiness.
    pub fn assign_player(&mut self, id: PlayerId, display_name: &str, side: Side) -> &mut PlayerState {
        let slot = self.slot_for_side(side);
        if let Some(current) = self.team_of(id) {
            if current != slot {
                self.teams[current.index()].remove_member(id);
            }
        }
        self.teams[slot.index()].add_member(id);

        let player = self
            .players
            .entry(id)
            .or_insert_with(|| PlayerState::new(id, display_name.to_string(), slot));
        if player.team != slot {
            player.team = slot;
            player.is_ready = false;
        }
        player
    }

    /// Detach a player from the match, promoting a new leader if needed
    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        let player = self.players.remove(&id)?;
        self.team_mut(player.team).remove_member(id);
        Some(player)
    }

    pub fn ready_count(&self) -> usize {
        self.players.values().filter(|p| p.is_ready).count()
    }

    /// Record every rostered player's starting side from their team
    pub fn snapshot_starting_sides(&mut self) {
        let sides = [self.teams[0].starting_side, self.teams[1].starting_side];
        for player in self.players.values_mut() {
            player.starting_side = Some(sides[player.team.index()]);
        }
    }

    /// Swap both teams' starting sides (and every player's snapshot)
    pub fn swap_starting_sides(&mut self) {
        for team in self.teams.iter_mut() {
            team.starting_side = team.starting_side.opposite();
        }
        for player in self.players.values_mut() {
            player.starting_side = player.starting_side.map(Side::opposite);
        }
    }

    /// Display name derived from the leader; empty when the team is leaderless
    pub fn team_name(&self, slot: TeamSlot) -> String {
        self.team(slot)
            .leader()
            .and_then(|id| self.players.get(&id))
            .map(|leader| format!("{}{}", TEAM_NAME_PREFIX, leader.display_name))
            .unwrap_or_default()
    }

    pub fn team_status(&self, slot: TeamSlot) -> TeamStatus {
        let team = self.team(slot);
        TeamStatus {
            slot,
            name: self.team_name(slot),
            starting_side: team.starting_side,
            leader: team.leader(),
            members: team.members().to_vec(),
        }
    }
}
