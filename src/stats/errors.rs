use thiserror::Error;

use crate::shared::{EventId, GameId};

#[derive(Debug, Error)]
pub enum StatsError {
    /// The classifier or a decoder met an event kind it does not know
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// Reversing a delta would drive a stored counter below zero
    #[error("Aggregate underflow in game {game_id}: {entity} field {field} would go negative")]
    AggregateUnderflow {
        game_id: GameId,
        entity: String,
        field: &'static str,
    },

    #[error("Missing membership: {0}")]
    MissingMembership(String),

    #[error("Game {0} not found")]
    GameNotFound(GameId),

    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// The caller's copy of an event no longer matches the stored one
    #[error("Event {0} changed since it was read")]
    StaleEvent(EventId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repository(String),
}
