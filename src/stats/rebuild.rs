use serde::{Deserialize, Serialize};
use std::fmt;

use super::models::GameAggregates;
use super::StatsError;
use crate::event::GameEvent;
use crate::shared::{GameId, PlayerId, TeamId};

/// Reconstructs a game's aggregate table from its live events.
///
/// Events are replayed in ascending creation sequence. The result is built
/// from scratch in memory, so a failure part-way leaves nothing behind.
pub fn replay(game_id: GameId, events: &[GameEvent]) -> Result<GameAggregates, StatsError> {
    let mut ordered: Vec<&GameEvent> = events.iter().collect();
    ordered.sort_by_key(|event| (event.sequence, event.id));

    let mut table = GameAggregates::new(game_id);
    for event in ordered {
        table.on_create(event)?;
    }
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowKey {
    Player(PlayerId),
    Team(TeamId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Player(id) => write!(f, "player {}", id),
            RowKey::Team(id) => write!(f, "team {}", id),
        }
    }
}

/// Outcome of comparing stored rows against a fresh replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub game_id: GameId,
    pub events_replayed: usize,
    pub mismatched_rows: Vec<RowKey>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatched_rows.is_empty()
    }
}

/// Lists every row that differs between `stored` and `rebuilt`.
/// Rows left empty by reversals are not differences.
pub fn compare(stored: &GameAggregates, rebuilt: &GameAggregates, events: usize) -> ConsistencyReport {
    let stored = stored.without_empty_rows();
    let rebuilt = rebuilt.without_empty_rows();
    let mut mismatched_rows = Vec::new();

    for player_id in stored.players.keys().chain(rebuilt.players.keys()) {
        let key = RowKey::Player(*player_id);
        if stored.players.get(player_id) != rebuilt.players.get(player_id)
            && !mismatched_rows.contains(&key)
        {
            mismatched_rows.push(key);
        }
    }
    for team_id in stored.teams.keys().chain(rebuilt.teams.keys()) {
        let key = RowKey::Team(team_id.clone());
        if stored.teams.get(team_id) != rebuilt.teams.get(team_id) && !mismatched_rows.contains(&key)
        {
            mismatched_rows.push(key);
        }
    }
    mismatched_rows.sort();

    ConsistencyReport {
        game_id: stored.game_id,
        events_replayed: events,
        mismatched_rows,
    }
}
