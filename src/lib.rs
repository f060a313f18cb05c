// Library crate for the courtstats engine
// This file exposes the public API for the admin binary and integration tests

pub mod config;
pub mod event;
pub mod game;
pub mod shared;
pub mod stats;

// Re-export commonly used types for easier access in tests
pub use config::AdminConfig;
pub use event::{EventFields, EventKind, EventPatch, GameEvent, Period, ShotKind};
pub use game::{Game, GameRepository, Player};
pub use stats::{StatsError, StatsRepository, StatsService};
