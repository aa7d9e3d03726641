//! Competitive Match Orchestrator Library
//!
//! Drives a competitive match for a round-based team shooter: warmup and
//! ready-up, a knife round with a stay/switch side vote, forfeits and
//! half-time side tracking for reconnecting players.
//!
//! The engine is reached only through [`host::Host`]; [`host::SimHost`] is an
//! in-memory engine for the console harness and tests.

pub mod config;
pub mod game;
pub mod host;
pub mod metrics;

pub use config::MatchConfig;
pub use game::session::{MatchSession, MatchStatus};
pub use metrics::MatchMetrics;
