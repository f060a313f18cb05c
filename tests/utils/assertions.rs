//! Test assertion helpers for aggregate tables
#![allow(dead_code)] // Test utilities may not all be used in every test

use courtstats::{
    shared::GameId,
    stats::{GameAggregates, PeriodTally, StatsService},
};

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Every team row equals the sum of the player rows credited to it
pub fn assert_player_rows_sum_to_team_rows(table: &GameAggregates) {
    for (team_id, team_row) in &table.teams {
        assert_eq!(
            table.player_totals_for_team(team_id),
            team_row.stats,
            "player rows of {} do not add up to its team row",
            team_id
        );

        let mut period_points = PeriodTally::default();
        for row in table.player_rows().filter(|row| &row.team_id == team_id) {
            period_points.merge(&row.points_by_period);
        }
        assert_eq!(
            period_points, team_row.points_by_period,
            "points by period of {} do not add up",
            team_id
        );
    }
}

/// Stored aggregates match a replay of the live events
pub async fn assert_consistent(service: &StatsService, game_id: GameId) {
    let report = service
        .verify(game_id)
        .await
        .expect("verification should succeed");
    assert!(
        report.is_consistent(),
        "game {} drifted: {:?}",
        game_id,
        report.mismatched_rows
    );
}
