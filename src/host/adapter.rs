use serde::{Deserialize, Serialize};

use crate::game::halftime::RoundLimits;
use crate::game::state::{PlayerId, Side};
use crate::host::protocol::HostCommand;

/// Engine view of a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePlayer {
    pub id: PlayerId,
    pub name: String,
    /// Current engine side (None = spectator / unassigned)
    pub side: Option<Side>,
    pub is_bot: bool,
    pub is_connected: bool,
    pub health: i32,
}

impl EnginePlayer {
    pub fn is_connected_human(&self) -> bool {
        self.is_connected && !self.is_bot
    }
}

/// Capabilities the match core needs from the game engine
pub trait Host {
    /// Every player the engine currently knows about
    fn players(&self) -> Vec<EnginePlayer>;

    fn player(&self, id: PlayerId) -> Option<EnginePlayer> {
        self.players().into_iter().find(|p| p.id == id)
    }

    /// Rounds played so far; `None` when the round-rules object is unavailable
    fn rounds_played(&self) -> Option<u32>;

    /// Regulation and overtime caps; `None` when the settings are unavailable
    fn round_limits(&self) -> Option<RoundLimits>;

    /// Fire-and-forget request
    fn dispatch(&mut self, command: HostCommand);
}
