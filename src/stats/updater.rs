use tracing::debug;

use super::delta::{classify, Delta};
use super::models::{GameAggregates, PlayerGameAggregate, TeamGameAggregate};
use super::StatsError;
use crate::event::GameEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Apply,
    Reverse,
}

impl PlayerGameAggregate {
    fn absorb(&mut self, delta: &Delta) {
        self.stats.add(&delta.stats);
        self.points_by_period
            .add(delta.period, delta.period_points());
    }

    fn release(&mut self, delta: &Delta) -> Result<(), &'static str> {
        self.stats = self.stats.checked_sub(&delta.stats)?;
        self.points_by_period
            .checked_remove(delta.period, delta.period_points())
            .ok_or("points_by_period")
    }
}

impl TeamGameAggregate {
    fn absorb(&mut self, delta: &Delta) {
        self.stats.add(&delta.stats);
        self.points_by_period
            .add(delta.period, delta.period_points());
        self.fg_made_by_period.add(delta.period, delta.period_fg_made);
        self.fg_attempted_by_period
            .add(delta.period, delta.period_fg_attempted);
    }

    fn release(&mut self, delta: &Delta) -> Result<(), &'static str> {
        self.stats = self.stats.checked_sub(&delta.stats)?;
        self.points_by_period
            .checked_remove(delta.period, delta.period_points())
            .ok_or("points_by_period")?;
        self.fg_made_by_period
            .checked_remove(delta.period, delta.period_fg_made)
            .ok_or("fg_made_by_period")?;
        self.fg_attempted_by_period
            .checked_remove(delta.period, delta.period_fg_attempted)
            .ok_or("fg_attempted_by_period")
    }
}

/// Create/update/delete contract over one game's aggregate table.
///
/// Every entry point either applies completely or leaves the table untouched.
impl GameAggregates {
    pub fn on_create(&mut self, event: &GameEvent) -> Result<(), StatsError> {
        self.ensure_same_game(event)?;
        self.apply_delta(&classify(&event.fields), Direction::Apply)
    }

    pub fn on_update(&mut self, old: &GameEvent, new: &GameEvent) -> Result<(), StatsError> {
        self.ensure_same_game(old)?;
        self.ensure_same_game(new)?;

        let mut scratch = self.clone();
        scratch.apply_delta(&classify(&old.fields), Direction::Reverse)?;
        scratch.apply_delta(&classify(&new.fields), Direction::Apply)?;
        *self = scratch;
        Ok(())
    }

    pub fn on_delete(&mut self, event: &GameEvent) -> Result<(), StatsError> {
        self.ensure_same_game(event)?;
        self.apply_delta(&classify(&event.fields), Direction::Reverse)
    }

    fn ensure_same_game(&self, event: &GameEvent) -> Result<(), StatsError> {
        if event.game_id != self.game_id {
            return Err(StatsError::MissingMembership(format!(
                "event {} belongs to game {}, not game {}",
                event.id, event.game_id, self.game_id
            )));
        }
        Ok(())
    }

    /// Adds or removes one delta on the player row and the team row.
    /// Both rows are computed before either is written back.
    fn apply_delta(&mut self, delta: &Delta, direction: Direction) -> Result<(), StatsError> {
        if delta.is_empty() {
            return Ok(());
        }

        let player_id = delta.player_id.ok_or_else(|| {
            StatsError::MissingMembership(format!(
                "stat event for team {} in game {} has no player",
                delta.team_id, self.game_id
            ))
        })?;

        let mut player_row = match self.players.get(&player_id) {
            Some(row) if row.team_id != delta.team_id => {
                return Err(StatsError::MissingMembership(format!(
                    "player {} is credited to team {} in game {}, not {}",
                    player_id, row.team_id, self.game_id, delta.team_id
                )));
            }
            Some(row) => row.clone(),
            None => PlayerGameAggregate::new(self.game_id, player_id, &delta.team_id),
        };
        let mut team_row = self
            .teams
            .get(&delta.team_id)
            .cloned()
            .unwrap_or_else(|| TeamGameAggregate::new(self.game_id, &delta.team_id));

        match direction {
            Direction::Apply => {
                player_row.absorb(delta);
                team_row.absorb(delta);
            }
            Direction::Reverse => {
                player_row
                    .release(delta)
                    .map_err(|field| StatsError::AggregateUnderflow {
                        game_id: self.game_id,
                        entity: format!("player {}", player_id),
                        field,
                    })?;
                team_row
                    .release(delta)
                    .map_err(|field| StatsError::AggregateUnderflow {
                        game_id: self.game_id,
                        entity: format!("team {}", delta.team_id),
                        field,
                    })?;
            }
        }

        debug!(
            game_id = self.game_id,
            player_id,
            team_id = %delta.team_id,
            ?direction,
            "Delta applied to aggregate rows"
        );

        self.players.insert(player_id, player_row);
        self.teams.insert(delta.team_id.clone(), team_row);
        Ok(())
    }
}
