//! Match lifecycle state machine
//!
//! [`MatchSession`] owns the match state, the timer registry and the host
//! adapter. Every engine hook, player command and timer callback is a
//! method here and runs to completion before the next one. Hooks may be
//! delivered more than once for the same occurrence, so every transition
//! is guarded on the current phase.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{MatchConfig, VoteStart};
use crate::game::constants::{items, keys, timing};
use crate::game::forfeit::{ForfeitWatchdog, WatchdogAction};
use crate::game::halftime::resolve_effective_side;
use crate::game::outcome::{evaluate_winner, tally_sides};
use crate::game::state::{
    MatchError, MatchState, Phase, PlayerId, Side, TeamSlot, TeamStatus, Vote,
};
use crate::game::timers::{TimerRegistry, TimerRole};
use crate::game::vote::{KnifeVoteCoordinator, VoteRejection};
use crate::host::adapter::Host;
use crate::host::protocol::{HookResult, HostCommand, Notice, RoundEndReason};
use crate::metrics::MatchMetrics;

/// Serializable snapshot of the session
#[derive(Debug, Clone, Serialize)]
pub struct MatchStatus {
    pub match_id: Uuid,
    pub phase: Phase,
    pub teams: Vec<TeamStatus>,
    pub ready: usize,
    pub match_size: usize,
    pub knife_winner: Option<TeamSlot>,
    pub decision: Option<Vote>,
    pub timers: Vec<TimerRole>,
    pub forfeit_in_secs: Option<u64>,
}

pub struct MatchSession<H: Host> {
    host: H,
    config: MatchConfig,
    state: MatchState,
    timers: TimerRegistry,
    votes: KnifeVoteCoordinator,
    watchdog: ForfeitWatchdog,
    rng: StdRng,
    metrics: Arc<MatchMetrics>,
    /// Time of the latest tick; hooks and commands schedule against it
    now: Instant,
    /// Cleared on map start; the next tick starts warmup
    initialized: bool,
    /// Clan-tag label last sent per player (true = ready)
    labels: HashMap<PlayerId, bool>,
}

impl<H: Host> MatchSession<H> {
    pub fn new(host: H, config: MatchConfig, metrics: Arc<MatchMetrics>, now: Instant) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            host,
            votes: KnifeVoteCoordinator::new(config.vote_policy),
            watchdog: ForfeitWatchdog::new(config.forfeit_grace),
            config,
            state: MatchState::new(now),
            timers: TimerRegistry::new(),
            rng,
            metrics,
            now,
            initialized: false,
            labels: HashMap::new(),
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MatchMetrics> {
        &self.metrics
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            match_id: self.state.id,
            phase: self.state.phase,
            teams: TeamSlot::ALL
                .iter()
                .map(|slot| self.state.team_status(*slot))
                .collect(),
            ready: self.state.ready_count(),
            match_size: self.config.match_size,
            knife_winner: self.state.knife_winner,
            decision: self.state.knife_vote_decision,
            timers: self.timers.active_roles(),
            forfeit_in_secs: self
                .watchdog
                .remaining(&self.timers, self.now)
                .map(|left| left.as_secs()),
        }
    }

    // ---- Engine hooks ----------------------------------------------------

    /// New map loaded: nothing scheduled survives, warmup restarts on the next tick
    pub fn on_map_start(&mut self) {
        self.timers.kill_all();
        self.labels.clear();
        self.initialized = false;
        info!(match_id = %self.state.id, "Map started");
    }

    /// Per-frame update
    pub fn on_tick(&mut self, now: Instant) {
        self.now = now;

        if !self.initialized {
            self.initialized = true;
            self.start_warmup();
        }

        for fired in self.timers.poll(now) {
            // A callback earlier in this batch may have reset the match
            if !self.timers.is_current(fired) {
                debug!(role = ?fired.role, "Dropped timer from a previous epoch");
                continue;
            }
            self.on_timer(fired.role);
        }

        match self.state.phase {
            Phase::Warmup => self.refresh_ready_labels(),
            Phase::Knife => self.phase_banner(Notice::KnifeRound),
            Phase::Live => self.phase_banner(Notice::MatchLive),
            _ => {}
        }
    }

    pub fn on_round_start(&mut self) {
        match self.state.phase {
            Phase::Knife => self.announce(Notice::KnifeRound),
            Phase::PreKnifeVote => self.begin_knife_vote(),
            Phase::PreLive => {
                if self.enter(Phase::Live) {
                    self.announce(Notice::MatchLive);
                }
            }
            _ => {}
        }
    }

    /// Round ended, before the scoreboard is shown
    pub fn on_round_end(&mut self) {
        if self.state.phase != Phase::Knife || self.state.knife_winner.is_some() {
            return;
        }

        let (attack, defense) = tally_sides(&self.host.players());
        let outcome = evaluate_winner(attack, defense, &mut self.rng);
        let slot = self.state.slot_for_side(outcome.winner);
        self.state.knife_winner = Some(slot);
        MatchMetrics::incr(&self.metrics.knife_rounds_decided);

        info!(
            match_id = %self.state.id,
            winner = ?outcome.winner,
            decided_by = ?outcome.decided_by,
            attack_alive = outcome.attack.alive,
            defense_alive = outcome.defense.alive,
            "Knife round decided"
        );

        if self.host.rounds_played().is_some() {
            self.host.dispatch(HostCommand::OverrideRoundEnd {
                winner: outcome.winner,
                reason: RoundEndReason::for_winner(outcome.winner),
                message_key: keys::KNIFE_WINNER_MESSAGE,
            });
        } else {
            error!(
                match_id = %self.state.id,
                "Round rules unavailable, skipping scoreboard override"
            );
        }

        self.announce(Notice::KnifeWinner {
            team: self.state.team_name(slot),
            side: outcome.winner,
        });
        self.enter(Phase::PreKnifeVote);

        if self.config.vote_start == VoteStart::RoundEnd {
            self.begin_knife_vote();
        }
    }

    /// Engine warmup timer ran out; warmup lasts until the players are ready
    pub fn on_warmup_end(&mut self) {
        if self.state.phase == Phase::Warmup {
            debug!("Engine warmup expired, restarting it");
            self.host.dispatch(HostCommand::StartWarmup);
        }
    }

    /// Match-end panel shown
    pub fn on_match_end(&mut self) {
        if self.state.phase != Phase::Warmup {
            info!(match_id = %self.state.id, "Match ended");
            self.start_warmup();
        }
    }

    pub fn on_player_connect(&mut self, player: PlayerId) {
        if let Err(e) = self.reconnect(player) {
            self.hook_failed("player_connect", &e);
        }
    }

    pub fn on_player_disconnect(&mut self, player: PlayerId) {
        if self.state.phase == Phase::Warmup {
            self.labels.remove(&player);
            if self.state.remove_player(player).is_some() {
                debug!(player, "Removed from warmup roster");
            }
            return;
        }

        let humans_remaining = self
            .host
            .players()
            .iter()
            .filter(|p| p.id != player && p.is_connected_human())
            .count();

        let action = self.watchdog.on_disconnect(
            self.state.phase,
            player,
            humans_remaining,
            &mut self.timers,
            self.now,
        );
        if action == WatchdogAction::Armed {
            self.announce(Notice::ForfeitPending {
                seconds: self.watchdog.grace().as_secs(),
            });
        }
    }

    /// Team join attempt. `side` None is a move to spectators.
    pub fn on_join_team(&mut self, player: PlayerId, side: Option<Side>) -> HookResult {
        if self.state.phase.rosters_locked() {
            debug!(player, phase = ?self.state.phase, "Team change locked");
            return HookResult::Stop;
        }

        let Some(side) = side else {
            self.state.remove_player(player);
            return HookResult::Continue;
        };

        if !self.config.is_allowed(player) {
            info!(player, "Team join blocked by whitelist");
            return HookResult::Stop;
        }

        let team = self.state.team(self.state.slot_for_side(side));
        if !team.contains(player) && team.len() >= self.config.team_capacity() {
            debug!(player, ?side, "Team full");
            return HookResult::Stop;
        }

        let name = self
            .host
            .player(player)
            .map(|p| p.name)
            .unwrap_or_default();
        self.state.assign_player(player, &name, side);
        HookResult::Continue
    }

    pub fn on_item_pickup(&mut self, player: PlayerId, item: &str) {
        if self.state.phase == Phase::Knife && !items::is_knife(item) {
            self.host.dispatch(HostCommand::StripWeapons { player });
        }
    }

    pub fn on_round_mvp(&self) -> HookResult {
        match self.state.phase {
            Phase::Knife | Phase::PreKnifeVote => HookResult::Stop,
            _ => HookResult::Continue,
        }
    }

    // ---- Player commands -------------------------------------------------

    /// `ready`: returns whether the player's readiness changed
    pub fn cmd_ready(&mut self, player: PlayerId) -> bool {
        if self.state.phase != Phase::Warmup {
            return false;
        }
        let Some(engine) = self.host.player(player).filter(|p| p.is_connected_human()) else {
            return false;
        };

        let Some(record) = self
            .state
            .get_or_create_player(player, &engine.name, engine.side)
        else {
            debug!(player, "Ready ignored, not on a team");
            return false;
        };
        if record.is_ready {
            return false;
        }
        record.set_ready(true);

        info!(
            player,
            ready = self.state.ready_count(),
            needed = self.config.match_size,
            "Player ready"
        );
        self.try_start_match();
        true
    }

    pub fn cmd_unready(&mut self, player: PlayerId) -> bool {
        if self.state.phase != Phase::Warmup {
            return false;
        }
        match self.state.player_mut(player) {
            Some(record) if record.is_ready => {
                record.set_ready(false);
                true
            }
            _ => false,
        }
    }

    pub fn cmd_stay(&mut self, player: PlayerId) -> bool {
        self.vote_command(player, Vote::Stay)
    }

    pub fn cmd_switch(&mut self, player: PlayerId) -> bool {
        self.vote_command(player, Vote::Switch)
    }

    /// Force start, skipping the ready count
    pub fn cmd_start(&mut self) -> bool {
        self.start_match()
    }

    /// Force a full reset
    pub fn cmd_restart(&mut self) {
        info!(match_id = %self.state.id, "Forced restart");
        self.start_warmup();
    }

    fn vote_command(&mut self, player: PlayerId, vote: Vote) -> bool {
        match self.assign_knife_vote(player, vote) {
            Ok(()) => true,
            Err(reason) => {
                debug!(player, ?vote, %reason, "Vote ignored");
                false
            }
        }
    }

    // ---- Transitions -----------------------------------------------------

    /// Full reset: fresh match state, every timer cancelled
    pub fn start_warmup(&mut self) {
        self.timers.kill_all();
        let previous = self.state.id;
        self.state = MatchState::new(self.now);
        self.labels.clear();
        self.metrics.set_phase(Phase::Warmup);
        MatchMetrics::incr(&self.metrics.warmup_resets);

        self.host.dispatch(HostCommand::StartWarmup);
        let quota = if self.config.bot_fill {
            self.config.match_size
        } else {
            0
        };
        self.host.dispatch(HostCommand::SetBotQuota { quota });

        self.timers.create(
            TimerRole::CommandReminder,
            self.config.announce_interval,
            true,
            self.now,
        );
        self.announce_commands();

        info!(match_id = %self.state.id, %previous, "Warmup started");
    }

    /// Watchdog expiry
    pub fn start_forfeit(&mut self) {
        warn!(match_id = %self.state.id, phase = ?self.state.phase, "Match forfeited");
        MatchMetrics::incr(&self.metrics.forfeits);
        self.start_warmup();
        self.announce(Notice::Forfeited);
    }

    /// Start the match once exactly `match_size` players are ready
    pub fn try_start_match(&mut self) -> bool {
        if self.state.phase == Phase::Warmup && self.state.ready_count() == self.config.match_size
        {
            self.start_match()
        } else {
            false
        }
    }

    /// Lock rosters, record starting sides and play the knife round
    pub fn start_match(&mut self) -> bool {
        if self.state.phase != Phase::Warmup {
            return false;
        }

        for engine in self.host.players() {
            if engine.is_connected_human() {
                self.state
                    .get_or_create_player(engine.id, &engine.name, engine.side);
            }
        }
        self.state.snapshot_starting_sides();
        self.timers.kill(TimerRole::CommandReminder);
        self.labels.clear();

        self.enter(Phase::Knife);
        MatchMetrics::incr(&self.metrics.matches_started);
        self.host.dispatch(HostCommand::StartKnifeRound);
        self.announce(Notice::KnifeRound);

        info!(
            match_id = %self.state.id,
            players = self.state.player_count(),
            "Match started"
        );
        true
    }

    /// Record a stay/switch vote and check whether it decides the sides
    pub fn assign_knife_vote(&mut self, player: PlayerId, vote: Vote) -> Result<(), VoteRejection> {
        if !matches!(self.state.phase, Phase::PreKnifeVote | Phase::KnifeVote) {
            return Err(VoteRejection::VotingClosed);
        }
        self.votes.cast(&mut self.state, player, vote)?;
        MatchMetrics::incr(&self.metrics.votes_accepted);
        info!(match_id = %self.state.id, player, ?vote, "Knife vote");

        self.try_start_live();
        Ok(())
    }

    /// Apply the decision if the current votes reach one
    pub fn try_start_live(&mut self) -> bool {
        if !matches!(self.state.phase, Phase::PreKnifeVote | Phase::KnifeVote) {
            return false;
        }
        match self.votes.tally(&self.state) {
            Some(decision) => self.start_live(decision),
            None => false,
        }
    }

    fn begin_knife_vote(&mut self) {
        if !self.enter(Phase::KnifeVote) {
            return;
        }
        self.host.dispatch(HostCommand::SetFrozen { frozen: true });
        self.timers.create(
            TimerRole::KnifeVoteAnnouncer,
            self.config.announce_interval,
            true,
            self.now,
        );
        self.timers.create(
            TimerRole::KnifeVoteTimeout,
            self.config.vote_timeout,
            false,
            self.now,
        );
        self.announce_vote_prompt();
    }

    fn on_vote_timeout(&mut self) {
        if !matches!(self.state.phase, Phase::PreKnifeVote | Phase::KnifeVote) {
            return;
        }
        let decision = self.votes.tally(&self.state).unwrap_or(Vote::Stay);
        info!(match_id = %self.state.id, ?decision, "Knife vote timed out");
        self.start_live(decision);
    }

    fn start_live(&mut self, decision: Vote) -> bool {
        if !self.votes.decide(&mut self.state, decision) {
            return false;
        }
        self.timers.kill(TimerRole::KnifeVoteAnnouncer);
        self.timers.kill(TimerRole::KnifeVoteTimeout);
        self.enter(Phase::PreLive);
        self.votes.apply(&mut self.state);

        match decision {
            Vote::Switch => {
                self.host.dispatch(HostCommand::SwapTeams);
                self.move_to_starting_sides();
                self.host.dispatch(HostCommand::StartLive);
            }
            Vote::Stay => {
                self.host.dispatch(HostCommand::StartLive);
                self.host.dispatch(HostCommand::RestartGame {
                    delay_secs: timing::LIVE_RESTART_DELAY_SECS,
                });
            }
        }
        self.host.dispatch(HostCommand::SetFrozen { frozen: false });
        self.announce(Notice::KnifeVoteDecided { vote: decision });
        MatchMetrics::incr(&self.metrics.lives_started);

        info!(match_id = %self.state.id, ?decision, "Sides decided");
        true
    }

    /// Absolute moves, so they agree with the engine swap whichever lands first
    fn move_to_starting_sides(&mut self) {
        let moves: Vec<(PlayerId, Side)> = self
            .host
            .players()
            .into_iter()
            .filter(|p| p.is_connected)
            .filter_map(|p| {
                let side = self.state.player(p.id)?.starting_side?;
                Some((p.id, side))
            })
            .collect();

        for (player, side) in moves {
            self.host.dispatch(HostCommand::MovePlayer {
                player,
                side: Some(side),
            });
        }
    }

    /// Put a connecting player where the match says they belong
    fn reconnect(&mut self, player: PlayerId) -> Result<(), MatchError> {
        if self.state.phase == Phase::Warmup {
            return Ok(());
        }
        match self.host.player(player) {
            Some(engine) if engine.is_connected_human() => {}
            _ => return Ok(()),
        }

        if !self.state.contains_player(player) {
            debug!(player, "Unknown player joined mid-match, moving to spectators");
            self.host.dispatch(HostCommand::MovePlayer { player, side: None });
            return Ok(());
        }

        if self.watchdog.on_reconnect(player, &mut self.timers) == WatchdogAction::Disarmed {
            self.announce(Notice::ForfeitCancelled);
        }

        let slot = self.state.require_team_of(player)?;
        let starting_side = self
            .state
            .player(player)
            .and_then(|p| p.starting_side)
            .unwrap_or(self.state.team(slot).starting_side);
        let rounds_played = self
            .host
            .rounds_played()
            .ok_or(MatchError::RoundRulesUnavailable)?;
        let limits = self
            .host
            .round_limits()
            .ok_or(MatchError::RoundLimitsUnavailable)?;
        let side = resolve_effective_side(starting_side, rounds_played, limits)?;

        info!(player, ?side, rounds_played, "Restoring side after reconnect");
        self.host.dispatch(HostCommand::MovePlayer {
            player,
            side: Some(side),
        });
        Ok(())
    }

    // ---- Timers and HUD --------------------------------------------------

    fn on_timer(&mut self, role: TimerRole) {
        match role {
            TimerRole::CommandReminder => {
                if self.state.phase == Phase::Warmup {
                    self.announce_commands();
                }
            }
            TimerRole::KnifeVoteAnnouncer => {
                if self.state.phase == Phase::KnifeVote {
                    self.announce_vote_prompt();
                }
            }
            TimerRole::KnifeVoteTimeout => self.on_vote_timeout(),
            TimerRole::MatchForfeit => self.start_forfeit(),
        }
    }

    fn announce_commands(&mut self) {
        self.announce(Notice::WarmupCommands {
            ready: self.state.ready_count(),
            needed: self.config.match_size,
        });
    }

    fn announce_vote_prompt(&mut self) {
        match self.vote_prompt() {
            Ok(notice) => self.announce(notice),
            Err(e) => self.hook_failed("knife_vote_announce", &e),
        }
    }

    fn vote_prompt(&self) -> Result<Notice, MatchError> {
        let winner = self.state.knife_winner.ok_or(MatchError::NoKnifeWinner)?;
        let seconds_left = self
            .timers
            .remaining(TimerRole::KnifeVoteTimeout, self.now)
            .map(|left| left.as_secs())
            .unwrap_or(0);
        Ok(Notice::KnifeVotePrompt {
            team: self.state.team_name(winner),
            seconds_left,
        })
    }

    fn refresh_ready_labels(&mut self) {
        let humans: Vec<PlayerId> = self
            .host
            .players()
            .into_iter()
            .filter(|p| p.is_connected_human())
            .map(|p| p.id)
            .collect();
        self.labels.retain(|id, _| humans.contains(id));

        for player in humans {
            let ready = self.state.player(player).is_some_and(|p| p.is_ready);
            if self.labels.insert(player, ready) == Some(ready) {
                continue;
            }
            let label_key = if ready {
                keys::READY_LABEL
            } else {
                keys::NOT_READY_LABEL
            };
            self.host
                .dispatch(HostCommand::SetClanTag { player, label_key });
        }
    }

    fn phase_banner(&mut self, notice: Notice) {
        if self.state.time_in_phase(self.now) < self.config.banner_window {
            self.host.dispatch(HostCommand::CenterBanner(notice));
        }
    }

    fn announce(&mut self, notice: Notice) {
        debug!(key = notice.message_key(), "Announce");
        self.host.dispatch(HostCommand::Announce(notice));
    }

    fn enter(&mut self, phase: Phase) -> bool {
        let from = self.state.phase;
        if !self.state.set_phase(phase, self.now) {
            return false;
        }
        self.metrics.set_phase(phase);
        info!(match_id = %self.state.id, ?from, to = ?phase, "Phase transition");
        true
    }

    fn hook_failed(&self, hook: &'static str, err: &MatchError) {
        error!(match_id = %self.state.id, hook, error = %err, "Hook failed");
        MatchMetrics::incr(&self.metrics.hook_errors);
    }
}
