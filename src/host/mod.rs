//! Engine adapter seam
//!
//! The match core only sees the engine through the [`adapter::Host`] trait
//! and the command/notice types in [`protocol`].

pub mod adapter;
pub mod protocol;
pub mod sim;

pub use adapter::{EnginePlayer, Host};
pub use protocol::{HookResult, HostCommand, Notice, RoundEndReason};
pub use sim::SimHost;
