use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::derived::{ShootingSplits, TeamRatings};
use crate::event::Period;
use crate::shared::{GameId, PlayerId, TeamId};

/// Declares the counting-stat vector once so that every per-field operation
/// (sum, checked reversal, zero test, column listing) stays in step with it.
macro_rules! counting_stats {
    ($(#[$meta:meta])* pub struct $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        pub struct $name {
            $(pub $field: u32,)+
        }

        impl $name {
            /// Field names in declaration order; doubles as the column list.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            pub fn is_zero(&self) -> bool {
                true $(&& self.$field == 0)+
            }

            pub fn add(&mut self, other: &Self) {
                $(self.$field += other.$field;)+
            }

            /// Field-wise subtraction, failing with the first field that would go negative.
            pub fn checked_sub(&self, other: &Self) -> Result<Self, &'static str> {
                Ok(Self {
                    $($field: self
                        .$field
                        .checked_sub(other.$field)
                        .ok_or(stringify!($field))?,)+
                })
            }

            /// Field values paired with their names, in declaration order.
            pub fn values(&self) -> Vec<(&'static str, u32)> {
                vec![$((stringify!($field), self.$field)),+]
            }

            /// Builds a line by looking each field up by name.
            pub fn try_from_fields<E>(
                mut lookup: impl FnMut(&'static str) -> Result<u32, E>,
            ) -> Result<Self, E> {
                Ok(Self {
                    $($field: lookup(stringify!($field))?,)+
                })
            }
        }
    };
}

counting_stats! {
    /// Counting statistics shared by player and team rows.
    /// Field-goal counts exclude free throws.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct StatLine {
        points,
        field_goals_made,
        field_goals_attempted,
        two_point_made,
        two_point_attempted,
        three_point_made,
        three_point_attempted,
        free_throws_made,
        free_throws_attempted,
        rebounds_offensive,
        rebounds_defensive,
        assists,
        steals,
        blocks,
        turnovers,
        fouls,
    }
}

impl StatLine {
    pub fn rebounds_total(&self) -> u32 {
        self.rebounds_offensive + self.rebounds_defensive
    }

    pub fn field_goals_missed(&self) -> u32 {
        self.field_goals_attempted
            .saturating_sub(self.field_goals_made)
    }

    pub fn free_throws_missed(&self) -> u32 {
        self.free_throws_attempted
            .saturating_sub(self.free_throws_made)
    }

    pub fn sum<'a>(lines: impl IntoIterator<Item = &'a StatLine>) -> StatLine {
        let mut total = StatLine::default();
        for line in lines {
            total.add(line);
        }
        total
    }
}

/// Per-period counter, e.g. `{"Q1": 5, "Q2": 3}`. Periods with a zero count are
/// never stored, so a tally reached by adding then removing equals a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodTally(BTreeMap<Period, u32>);

impl PeriodTally {
    pub fn get(&self, period: Period) -> u32 {
        self.0.get(&period).copied().unwrap_or_default()
    }

    pub fn add(&mut self, period: Period, amount: u32) {
        if amount > 0 {
            *self.0.entry(period).or_default() += amount;
        }
    }

    /// Returns `None` if the period holds less than `amount`.
    pub fn checked_remove(&mut self, period: Period, amount: u32) -> Option<()> {
        if amount == 0 {
            return Some(());
        }
        let remaining = self.get(period).checked_sub(amount)?;
        if remaining == 0 {
            self.0.remove(&period);
        } else {
            self.0.insert(period, remaining);
        }
        Some(())
    }

    pub fn merge(&mut self, other: &PeriodTally) {
        for (period, amount) in &other.0 {
            self.add(*period, *amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, u32)> + '_ {
        self.0.iter().map(|(period, amount)| (*period, *amount))
    }

    pub fn as_map(&self) -> &BTreeMap<Period, u32> {
        &self.0
    }
}

impl From<BTreeMap<Period, u32>> for PeriodTally {
    fn from(map: BTreeMap<Period, u32>) -> Self {
        Self(map.into_iter().filter(|(_, amount)| *amount > 0).collect())
    }
}

/// Denormalized player box score, one row per player per game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGameAggregate {
    pub game_id: GameId,
    pub player_id: PlayerId,
    /// Team the player's events were credited under
    pub team_id: TeamId,
    #[serde(flatten)]
    pub stats: StatLine,
    pub points_by_period: PeriodTally,
}

impl PlayerGameAggregate {
    pub fn new(game_id: GameId, player_id: PlayerId, team_id: &str) -> Self {
        Self {
            game_id,
            player_id,
            team_id: team_id.to_string(),
            stats: StatLine::default(),
            points_by_period: PeriodTally::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_zero() && self.points_by_period.is_empty()
    }
}

/// Denormalized team box score, one row per team per game.
/// Carries per-period field-goal splits on top of the shared counting fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamGameAggregate {
    pub game_id: GameId,
    pub team_id: TeamId,
    #[serde(flatten)]
    pub stats: StatLine,
    pub points_by_period: PeriodTally,
    pub fg_made_by_period: PeriodTally,
    pub fg_attempted_by_period: PeriodTally,
}

impl TeamGameAggregate {
    pub fn new(game_id: GameId, team_id: &str) -> Self {
        Self {
            game_id,
            team_id: team_id.to_string(),
            stats: StatLine::default(),
            points_by_period: PeriodTally::default(),
            fg_made_by_period: PeriodTally::default(),
            fg_attempted_by_period: PeriodTally::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_zero()
            && self.points_by_period.is_empty()
            && self.fg_made_by_period.is_empty()
            && self.fg_attempted_by_period.is_empty()
    }
}

/// All aggregate rows of one game. This is the unit the per-game write lock guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAggregates {
    pub game_id: GameId,
    pub players: BTreeMap<PlayerId, PlayerGameAggregate>,
    pub teams: BTreeMap<TeamId, TeamGameAggregate>,
}

impl GameAggregates {
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            players: BTreeMap::new(),
            teams: BTreeMap::new(),
        }
    }

    pub fn from_rows(
        game_id: GameId,
        players: Vec<PlayerGameAggregate>,
        teams: Vec<TeamGameAggregate>,
    ) -> Self {
        Self {
            game_id,
            players: players.into_iter().map(|row| (row.player_id, row)).collect(),
            teams: teams
                .into_iter()
                .map(|row| (row.team_id.clone(), row))
                .collect(),
        }
    }

    /// Rows emptied by reversals stay until a rebuild; this view drops them so
    /// incremental and rebuilt state can be compared.
    pub fn without_empty_rows(&self) -> Self {
        Self {
            game_id: self.game_id,
            players: self
                .players
                .iter()
                .filter(|(_, row)| !row.is_empty())
                .map(|(id, row)| (*id, row.clone()))
                .collect(),
            teams: self
                .teams
                .iter()
                .filter(|(_, row)| !row.is_empty())
                .map(|(id, row)| (id.clone(), row.clone()))
                .collect(),
        }
    }

    /// Sum of the player rows credited to `team_id`
    pub fn player_totals_for_team(&self, team_id: &str) -> StatLine {
        StatLine::sum(
            self.players
                .values()
                .filter(|row| row.team_id == team_id)
                .map(|row| &row.stats),
        )
    }

    pub fn player_rows(&self) -> impl Iterator<Item = &PlayerGameAggregate> {
        self.players.values()
    }

    pub fn team_rows(&self) -> impl Iterator<Item = &TeamGameAggregate> {
        self.teams.values()
    }
}

/// Player box score as served: stored counts plus derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameLine {
    #[serde(flatten)]
    pub row: PlayerGameAggregate,
    pub rebounds_total: u32,
    #[serde(flatten)]
    pub shooting: ShootingSplits,
    pub composite_rating: Option<f64>,
}

/// Team box score as served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameLine {
    #[serde(flatten)]
    pub row: TeamGameAggregate,
    pub rebounds_total: u32,
    #[serde(flatten)]
    pub shooting: ShootingSplits,
    #[serde(flatten)]
    pub ratings: TeamRatings,
}

/// A player's totals across every game they have a row in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonLine {
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub games_played: u32,
    #[serde(flatten)]
    pub totals: StatLine,
    pub rebounds_total: u32,
    #[serde(flatten)]
    pub shooting: ShootingSplits,
    pub composite_rating: Option<f64>,
}

/// A team's totals and record across its games
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonLine {
    pub team_id: TeamId,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    #[serde(flatten)]
    pub totals: StatLine,
    pub rebounds_total: u32,
    #[serde(flatten)]
    pub shooting: ShootingSplits,
    #[serde(flatten)]
    pub ratings: TeamRatings,
}
