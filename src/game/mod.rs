pub mod constants;
pub mod forfeit;
pub mod halftime;
pub mod outcome;
pub mod session;
pub mod state;
pub mod timers;
pub mod vote;
