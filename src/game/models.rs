use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::shared::{GameId, PlayerId, TeamId};

/// A single game between two teams
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String, // e.g. "Lakers vs Celtics - Week 3"
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub date: DateTime<Utc>,
}

impl Game {
    pub fn new(id: GameId, name: &str, home_team_id: &str, away_team_id: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            home_team_id: home_team_id.to_string(),
            away_team_id: away_team_id.to_string(),
            date: Utc::now(),
        }
    }

    /// Check if a team plays in this game
    pub fn has_team(&self, team_id: &str) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    /// The other side of the game, if `team_id` plays in it
    pub fn opponent_of(&self, team_id: &str) -> Option<&str> {
        if self.home_team_id == team_id {
            Some(&self.away_team_id)
        } else if self.away_team_id == team_id {
            Some(&self.home_team_id)
        } else {
            None
        }
    }

    pub fn is_home(&self, team_id: &str) -> bool {
        self.home_team_id == team_id
    }
}

/// A registered player. Players belong to exactly one team.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub jersey_number: Option<String>,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, team_id: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            team_id: team_id.to_string(),
            jersey_number: None,
        }
    }
}
