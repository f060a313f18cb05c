// Tagged game events
//
// Events are owned by the event store; the stats engine only reads them.

// Public API - what other modules can use
pub use models::{
    final_score, sort_chronologically, EventFields, EventFilter, EventKind, EventPatch, GameEvent,
    Period, ReboundKind, ScoreSnapshot, ShotKind,
};

// Internal modules
pub mod models;
