//! Read-side metrics. Nothing here touches stored state.
//!
//! Every ratio returns `None` when its denominator is zero: an attempt-less
//! row has no percentage, which is not the same as a zero percentage.

use serde::{Deserialize, Serialize};

use super::models::StatLine;
use crate::shared::round_one_decimal;

/// Free-throw weight used by true shooting percentage
const TRUE_SHOOTING_FT_FACTOR: f64 = 0.44;

pub fn percentage(made: u32, attempted: u32) -> Option<f64> {
    if attempted == 0 {
        return None;
    }
    Some(f64::from(made) / f64::from(attempted) * 100.0)
}

pub fn true_shooting_pct(stats: &StatLine) -> Option<f64> {
    let denominator = 2.0
        * (f64::from(stats.field_goals_attempted)
            + TRUE_SHOOTING_FT_FACTOR * f64::from(stats.free_throws_attempted));
    if denominator == 0.0 {
        return None;
    }
    Some(f64::from(stats.points) / denominator * 100.0)
}

pub fn effective_fg_pct(stats: &StatLine) -> Option<f64> {
    if stats.field_goals_attempted == 0 {
        return None;
    }
    let weighted_makes = f64::from(stats.field_goals_made) + 0.5 * f64::from(stats.three_point_made);
    Some(weighted_makes / f64::from(stats.field_goals_attempted) * 100.0)
}

/// Shooting percentages of one row or one set of summed rows, rounded for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootingSplits {
    pub fg_pct: Option<f64>,
    pub two_pt_pct: Option<f64>,
    pub three_pt_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub ts_pct: Option<f64>,
    pub efg_pct: Option<f64>,
}

impl ShootingSplits {
    pub fn from_stats(stats: &StatLine) -> Self {
        Self {
            fg_pct: percentage(stats.field_goals_made, stats.field_goals_attempted)
                .map(round_one_decimal),
            two_pt_pct: percentage(stats.two_point_made, stats.two_point_attempted)
                .map(round_one_decimal),
            three_pt_pct: percentage(stats.three_point_made, stats.three_point_attempted)
                .map(round_one_decimal),
            ft_pct: percentage(stats.free_throws_made, stats.free_throws_attempted)
                .map(round_one_decimal),
            ts_pct: true_shooting_pct(stats).map(round_one_decimal),
            efg_pct: effective_fg_pct(stats).map(round_one_decimal),
        }
    }
}

/// Possession estimate behind the team ratings.
///
/// `possessions ≈ FGA - OREB + TOV + free_throw_factor * FTA`. The factor is
/// the usual 0.44 and can be recalibrated without touching aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PossessionModel {
    pub free_throw_factor: f64,
}

impl Default for PossessionModel {
    fn default() -> Self {
        Self {
            free_throw_factor: 0.44,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRatings {
    /// Points scored per 100 possessions
    pub offensive_rating: Option<f64>,
    /// Points allowed per 100 possessions
    pub defensive_rating: Option<f64>,
    /// Possessions per game
    pub pace: Option<f64>,
}

impl PossessionModel {
    pub fn possessions(&self, stats: &StatLine) -> f64 {
        f64::from(stats.field_goals_attempted) - f64::from(stats.rebounds_offensive)
            + f64::from(stats.turnovers)
            + self.free_throw_factor * f64::from(stats.free_throws_attempted)
    }

    /// Ratings for `own` totals over `games` games. `opponent_points` is what
    /// the opposing rows scored over the same games; without it there is no
    /// defensive rating.
    pub fn ratings(&self, own: &StatLine, opponent_points: Option<u32>, games: u32) -> TeamRatings {
        let possessions = self.possessions(own);
        if possessions <= 0.0 {
            return TeamRatings::default();
        }

        let per_100 = |points: u32| round_one_decimal(f64::from(points) / possessions * 100.0);
        TeamRatings {
            offensive_rating: Some(per_100(own.points)),
            defensive_rating: opponent_points.map(per_100),
            pace: (games > 0).then(|| round_one_decimal(possessions / f64::from(games))),
        }
    }
}

/// Weights of the composite player rating.
///
/// Production is what a player adds (points, boards, assists, steals,
/// blocks); negatives are turnovers and missed shots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingWeights {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
    pub missed_field_goals: f64,
    pub missed_free_throws: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            points: 1.0,
            rebounds: 1.2,
            assists: 1.5,
            steals: 2.0,
            blocks: 2.0,
            turnovers: 1.0,
            missed_field_goals: 0.5,
            missed_free_throws: 0.5,
        }
    }
}

impl RatingWeights {
    pub fn production(&self, stats: &StatLine) -> f64 {
        self.points * f64::from(stats.points)
            + self.rebounds * f64::from(stats.rebounds_total())
            + self.assists * f64::from(stats.assists)
            + self.steals * f64::from(stats.steals)
            + self.blocks * f64::from(stats.blocks)
    }

    pub fn negatives(&self, stats: &StatLine) -> f64 {
        self.turnovers * f64::from(stats.turnovers)
            + self.missed_field_goals * f64::from(stats.field_goals_missed())
            + self.missed_free_throws * f64::from(stats.free_throws_missed())
    }

    /// Composite rating on a 0-100 scale.
    ///
    /// `team` are the team totals over the same games, the player included.
    /// The rating is the player's share of team production scaled by the
    /// player's own production-to-cost ratio:
    /// `100 * P/(P+O) * P/(P+N)` with `O` the rest of the team's production.
    /// Each factor only grows with the player's production and shrinks with
    /// turnovers and misses, and both stay within [0, 1].
    pub fn composite(&self, player: &StatLine, team: &StatLine) -> Option<f64> {
        let team_production = self.production(team);
        if team_production <= 0.0 {
            return None;
        }

        let own = self.production(player);
        if own <= 0.0 {
            return Some(0.0);
        }
        let rest_of_team = (team_production - own).max(0.0);
        let cost = self.negatives(player);

        let share = own / (own + rest_of_team);
        let efficiency = own / (own + cost);
        Some(round_one_decimal((100.0 * share * efficiency).clamp(0.0, 100.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: u32, fgm: u32, fga: u32, tpm: u32, ftm: u32, fta: u32) -> StatLine {
        StatLine {
            points,
            field_goals_made: fgm,
            field_goals_attempted: fga,
            three_point_made: tpm,
            three_point_attempted: tpm,
            two_point_made: fgm - tpm,
            two_point_attempted: fga - tpm,
            free_throws_made: ftm,
            free_throws_attempted: fta,
            ..StatLine::default()
        }
    }

    #[test]
    fn percentages_are_none_without_attempts() {
        let empty = StatLine::default();
        assert_eq!(percentage(0, 0), None);
        assert_eq!(true_shooting_pct(&empty), None);
        assert_eq!(effective_fg_pct(&empty), None);
        assert_eq!(ShootingSplits::from_stats(&empty), ShootingSplits::default());
    }

    #[test]
    fn free_throw_only_line_has_true_shooting_but_no_fg() {
        let stats = line(2, 0, 0, 0, 2, 2);
        let splits = ShootingSplits::from_stats(&stats);
        assert_eq!(splits.fg_pct, None);
        assert_eq!(splits.efg_pct, None);
        assert_eq!(splits.ft_pct, Some(100.0));
        // 2 / (2 * 0.88) * 100
        assert_eq!(splits.ts_pct, Some(113.6));
    }

    #[test]
    fn shooting_splits_match_standard_formulas() {
        // 5/10 FG with two threes, 3/4 FT: 8 + 6 + 3 = 17 points
        let stats = line(17, 5, 10, 2, 3, 4);
        let splits = ShootingSplits::from_stats(&stats);
        assert_eq!(splits.fg_pct, Some(50.0));
        assert_eq!(splits.three_pt_pct, Some(100.0));
        assert_eq!(splits.two_pt_pct, Some(37.5));
        assert_eq!(splits.ft_pct, Some(75.0));
        assert_eq!(splits.efg_pct, Some(60.0));
        // 17 / (2 * (10 + 1.76)) * 100 = 72.27
        assert_eq!(splits.ts_pct, Some(72.3));
    }

    #[test]
    fn team_ratings_use_possession_estimate() {
        let own = StatLine {
            points: 100,
            field_goals_attempted: 80,
            rebounds_offensive: 10,
            turnovers: 15,
            free_throws_attempted: 25,
            ..StatLine::default()
        };
        // 80 - 10 + 15 + 11 = 96 possessions
        let ratings = PossessionModel::default().ratings(&own, Some(96), 1);
        assert_eq!(ratings.offensive_rating, Some(104.2));
        assert_eq!(ratings.defensive_rating, Some(100.0));
        assert_eq!(ratings.pace, Some(96.0));

        let two_games = PossessionModel::default().ratings(&own, None, 2);
        assert_eq!(two_games.pace, Some(48.0));
        assert_eq!(two_games.defensive_rating, None);
    }

    #[test]
    fn ratings_are_none_without_possessions() {
        let ratings = PossessionModel::default().ratings(&StatLine::default(), Some(10), 1);
        assert_eq!(ratings, TeamRatings::default());
    }

    #[test]
    fn free_throw_factor_is_calibratable() {
        let own = StatLine {
            free_throws_attempted: 10,
            ..StatLine::default()
        };
        let model = PossessionModel {
            free_throw_factor: 0.5,
        };
        assert_eq!(model.possessions(&own), 5.0);
    }

    #[test]
    fn composite_is_none_when_team_produced_nothing() {
        let weights = RatingWeights::default();
        assert_eq!(
            weights.composite(&StatLine::default(), &StatLine::default()),
            None
        );
    }

    #[test]
    fn composite_is_bounded() {
        let weights = RatingWeights::default();
        let solo = line(30, 12, 12, 0, 6, 6);
        assert_eq!(weights.composite(&solo, &solo), Some(100.0));

        let idle = StatLine::default();
        assert_eq!(weights.composite(&idle, &solo), Some(0.0));
    }

    #[test]
    fn composite_grows_with_production_and_drops_with_turnovers() {
        let weights = RatingWeights::default();
        let teammates = StatLine {
            points: 40,
            assists: 8,
            ..StatLine::default()
        };
        let base = StatLine {
            points: 10,
            field_goals_made: 5,
            field_goals_attempted: 9,
            two_point_made: 5,
            two_point_attempted: 9,
            turnovers: 2,
            ..StatLine::default()
        };
        let rating_of = |player: StatLine| {
            let mut team = teammates;
            team.add(&player);
            weights.composite(&player, &team).unwrap()
        };

        let base_rating = rating_of(base);
        for bump in [
            StatLine { points: 1, ..StatLine::default() },
            StatLine { rebounds_defensive: 1, ..StatLine::default() },
            StatLine { assists: 1, ..StatLine::default() },
            StatLine { steals: 1, ..StatLine::default() },
            StatLine { blocks: 1, ..StatLine::default() },
        ] {
            let mut better = base;
            better.add(&bump);
            assert!(rating_of(better) >= base_rating);
        }

        let mut sloppier = base;
        sloppier.turnovers += 3;
        assert!(rating_of(sloppier) <= base_rating);
        assert!((0.0..=100.0).contains(&base_rating));
    }
}
