//! In-memory engine used by the console harness, tests and benches
//!
//! Applies the side-changing commands to its own player table and forwards
//! every command to a channel so callers can observe what the core asked for.

use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeMap;
use tracing::trace;

use crate::game::halftime::RoundLimits;
use crate::game::state::{PlayerId, Side};
use crate::host::adapter::{EnginePlayer, Host};
use crate::host::protocol::HostCommand;

/// Full health for a freshly spawned player
pub const SPAWN_HEALTH: i32 = 100;

pub struct SimHost {
    players: BTreeMap<PlayerId, EnginePlayer>,
    rounds_played: Option<u32>,
    limits: Option<RoundLimits>,
    outbox: Sender<HostCommand>,
}

impl SimHost {
    /// Create a host and the receiving end of its command log
    pub fn new() -> (Self, Receiver<HostCommand>) {
        let (outbox, commands) = crossbeam_channel::unbounded();
        let host = Self {
            players: BTreeMap::new(),
            rounds_played: Some(0),
            limits: Some(RoundLimits::default()),
            outbox,
        };
        (host, commands)
    }

    /// A player finished connecting on `side`
    pub fn connect(&mut self, id: PlayerId, name: &str, side: Option<Side>, is_bot: bool) {
        self.players.insert(
            id,
            EnginePlayer {
                id,
                name: name.to_string(),
                side,
                is_bot,
                is_connected: true,
                health: SPAWN_HEALTH,
            },
        );
    }

    pub fn disconnect(&mut self, id: PlayerId) -> Option<EnginePlayer> {
        self.players.remove(&id)
    }

    pub fn set_side(&mut self, id: PlayerId, side: Option<Side>) {
        if let Some(player) = self.players.get_mut(&id) {
            player.side = side;
        }
    }

    pub fn set_health(&mut self, id: PlayerId, health: i32) {
        if let Some(player) = self.players.get_mut(&id) {
            player.health = health;
        }
    }

    /// Bring every player back to full health (new round)
    pub fn respawn_all(&mut self) {
        for player in self.players.values_mut() {
            player.health = SPAWN_HEALTH;
        }
    }

    pub fn set_rounds_played(&mut self, rounds: Option<u32>) {
        self.rounds_played = rounds;
    }

    pub fn set_round_limits(&mut self, limits: Option<RoundLimits>) {
        self.limits = limits;
    }

    /// Count one more completed round
    pub fn finish_round(&mut self) {
        if let Some(rounds) = self.rounds_played.as_mut() {
            *rounds += 1;
        }
    }

    fn apply(&mut self, command: &HostCommand) {
        match command {
            HostCommand::MovePlayer { player, side } => self.set_side(*player, *side),
            HostCommand::SwapTeams => {
                for player in self.players.values_mut() {
                    player.side = player.side.map(Side::opposite);
                }
                // Swapping restarts the game on the engine side
                if self.rounds_played.is_some() {
                    self.rounds_played = Some(0);
                }
            }
            HostCommand::StartWarmup
            | HostCommand::StartKnifeRound
            | HostCommand::RestartGame { .. } => {
                if self.rounds_played.is_some() {
                    self.rounds_played = Some(0);
                }
                self.respawn_all();
            }
            _ => {}
        }
    }
}

impl Host for SimHost {
    fn players(&self) -> Vec<EnginePlayer> {
        self.players.values().cloned().collect()
    }

    fn player(&self, id: PlayerId) -> Option<EnginePlayer> {
        self.players.get(&id).cloned()
    }

    fn rounds_played(&self) -> Option<u32> {
        self.rounds_played
    }

    fn round_limits(&self) -> Option<RoundLimits> {
        self.limits
    }

    fn dispatch(&mut self, command: HostCommand) {
        self.apply(&command);
        trace!(?command, "Host command");
        // Nobody listening is fine: commands are fire-and-forget
        let _ = self.outbox.send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_disconnect() {
        let (mut host, _rx) = SimHost::new();
        host.connect(1, "alice", Some(Side::Attack), false);
        host.connect(2, "bot", Some(Side::Defense), true);

        assert_eq!(host.players().len(), 2);
        assert!(host.player(1).unwrap().is_connected_human());
        assert!(!host.player(2).unwrap().is_connected_human());

        host.disconnect(1);
        assert!(host.player(1).is_none());
    }

    #[test]
    fn test_dispatch_forwards_and_applies() {
        let (mut host, rx) = SimHost::new();
        host.connect(1, "alice", Some(Side::Attack), false);
        host.connect(2, "bob", Some(Side::Defense), false);

        host.dispatch(HostCommand::SwapTeams);
        assert_eq!(host.player(1).unwrap().side, Some(Side::Defense));
        assert_eq!(host.player(2).unwrap().side, Some(Side::Attack));

        host.dispatch(HostCommand::MovePlayer {
            player: 1,
            side: None,
        });
        assert_eq!(host.player(1).unwrap().side, None);

        let log: Vec<HostCommand> = rx.try_iter().collect();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], HostCommand::SwapTeams);
    }

    #[test]
    fn test_restart_resets_rounds() {
        let (mut host, _rx) = SimHost::new();
        host.connect(1, "alice", Some(Side::Attack), false);
        host.set_health(1, 3);
        host.finish_round();
        host.finish_round();
        assert_eq!(host.rounds_played(), Some(2));

        host.dispatch(HostCommand::RestartGame { delay_secs: 1 });
        assert_eq!(host.rounds_played(), Some(0));
        assert_eq!(host.player(1).unwrap().health, SPAWN_HEALTH);
    }

    #[test]
    fn test_missing_dependencies() {
        let (mut host, _rx) = SimHost::new();
        host.set_rounds_played(None);
        host.set_round_limits(None);
        host.finish_round();
        assert!(host.rounds_played().is_none());
        assert!(host.round_limits().is_none());
    }
}
