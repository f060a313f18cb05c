/// Identifier of a registered game
pub type GameId = i64;

/// Identifier of a registered player
pub type PlayerId = i64;

/// Identifier of a tagged game event
pub type EventId = i64;

/// Teams are referenced by their external string identifier (e.g. "lakers")
pub type TeamId = String;

/// Rounds a derived metric to one decimal place for display.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
