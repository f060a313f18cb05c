use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::derived::{PossessionModel, RatingWeights, ShootingSplits};
use super::models::{PlayerGameAggregate, PlayerSeasonLine, StatLine, TeamGameAggregate, TeamSeasonLine};
use super::StatsError;
use crate::event::ScoreSnapshot;
use crate::game::Game;
use crate::shared::{GameId, PlayerId};

/// Outcome of one game from one team's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Win,
    Loss,
    Tie,
}

impl GameResult {
    /// Reads the result off the game's final score snapshot. `None` when the
    /// team did not play in the game.
    pub fn for_team(game: &Game, team_id: &str, score: ScoreSnapshot) -> Option<Self> {
        if !game.has_team(team_id) {
            return None;
        }
        let (own, other) = if game.is_home(team_id) {
            (score.home, score.away)
        } else {
            (score.away, score.home)
        };
        Some(match own.cmp(&other) {
            std::cmp::Ordering::Greater => GameResult::Win,
            std::cmp::Ordering::Less => GameResult::Loss,
            std::cmp::Ordering::Equal => GameResult::Tie,
        })
    }
}

fn distinct_games<'a>(ids: impl Iterator<Item = &'a GameId>) -> u32 {
    ids.collect::<BTreeSet<_>>().len() as u32
}

/// Sums a player's rows across games.
///
/// Percentages come from the summed counts. `team_rows` are the rows of the
/// teams the player was credited under, for the same games; they feed the
/// composite rating.
pub fn player_season(
    player_id: PlayerId,
    rows: &[PlayerGameAggregate],
    team_rows: &[TeamGameAggregate],
    weights: &RatingWeights,
) -> Result<PlayerSeasonLine, StatsError> {
    let latest = rows
        .iter()
        .max_by_key(|row| row.game_id)
        .ok_or_else(|| StatsError::NotFound(format!("no stats for player {}", player_id)))?;

    let totals = StatLine::sum(rows.iter().map(|row| &row.stats));
    let credited: BTreeSet<(GameId, &str)> = rows
        .iter()
        .map(|row| (row.game_id, row.team_id.as_str()))
        .collect();
    let team_totals = StatLine::sum(
        team_rows
            .iter()
            .filter(|team| credited.contains(&(team.game_id, team.team_id.as_str())))
            .map(|team| &team.stats),
    );

    Ok(PlayerSeasonLine {
        player_id,
        team_id: latest.team_id.clone(),
        games_played: distinct_games(rows.iter().map(|row| &row.game_id)),
        rebounds_total: totals.rebounds_total(),
        shooting: ShootingSplits::from_stats(&totals),
        composite_rating: weights.composite(&totals, &team_totals),
        totals,
    })
}

/// Sums a team's rows across games, with its record and ratings.
///
/// `opponent_rows` are the other side's rows in the same games; they give
/// points allowed. `results` maps each game with a final score to its
/// outcome; games missing from it count as neither win nor loss.
pub fn team_season(
    team_id: &str,
    rows: &[TeamGameAggregate],
    opponent_rows: &[TeamGameAggregate],
    results: &BTreeMap<GameId, GameResult>,
    model: &PossessionModel,
) -> Result<TeamSeasonLine, StatsError> {
    if rows.is_empty() {
        return Err(StatsError::NotFound(format!("no stats for team {}", team_id)));
    }

    let played: BTreeSet<GameId> = rows.iter().map(|row| row.game_id).collect();
    let totals = StatLine::sum(rows.iter().map(|row| &row.stats));

    let opponents: Vec<&TeamGameAggregate> = opponent_rows
        .iter()
        .filter(|row| row.team_id != team_id && played.contains(&row.game_id))
        .collect();
    let opponent_points =
        (!opponents.is_empty()).then(|| opponents.iter().map(|row| row.stats.points).sum());

    let outcomes = played.iter().filter_map(|game_id| results.get(game_id));
    let (mut wins, mut losses) = (0, 0);
    for outcome in outcomes {
        match outcome {
            GameResult::Win => wins += 1,
            GameResult::Loss => losses += 1,
            GameResult::Tie => {}
        }
    }

    let games_played = played.len() as u32;
    Ok(TeamSeasonLine {
        team_id: team_id.to_string(),
        games_played,
        wins,
        losses,
        rebounds_total: totals.rebounds_total(),
        shooting: ShootingSplits::from_stats(&totals),
        ratings: model.ratings(&totals, opponent_points, games_played),
        totals,
    })
}
