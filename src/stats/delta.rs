use serde::{Deserialize, Serialize};

use super::models::StatLine;
use crate::event::{EventFields, EventKind, Period, ReboundKind, ShotKind};
use crate::shared::{PlayerId, TeamId};

/// Statistical effect of one event on its player row and team row.
///
/// Deltas are always stored as non-negative increments; the updater decides
/// whether to add or remove them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub player_id: Option<PlayerId>,
    pub team_id: TeamId,
    pub period: Period,
    pub stats: StatLine,
    /// Team-only field-goal split for the event's period (free throws excluded)
    pub period_fg_made: u32,
    pub period_fg_attempted: u32,
}

impl Delta {
    fn empty(event: &EventFields) -> Self {
        Self {
            player_id: event.player_id,
            team_id: event.team_id.clone(),
            period: event.period,
            stats: StatLine::default(),
            period_fg_made: 0,
            period_fg_attempted: 0,
        }
    }

    /// Log-only events produce an empty delta and never touch aggregate rows
    pub fn is_empty(&self) -> bool {
        self.stats.is_zero() && self.period_fg_made == 0 && self.period_fg_attempted == 0
    }

    /// Points to add to the period tally
    pub fn period_points(&self) -> u32 {
        self.stats.points
    }
}

/// Maps one event's fields to its counting-stat delta.
///
/// Pure: the result depends on nothing but `event`, which is what lets an
/// update be undone by removing the old delta and adding the new one.
pub fn classify(event: &EventFields) -> Delta {
    let mut delta = Delta::empty(event);
    let stats = &mut delta.stats;

    match event.kind {
        EventKind::ShotMade | EventKind::ShotMissed => {
            let made = event.kind == EventKind::ShotMade;
            let made_count = u32::from(made);
            let shot_kind = event.shot_kind.unwrap_or(ShotKind::TwoPoint);

            match shot_kind {
                ShotKind::FreeThrow => {
                    stats.free_throws_attempted = 1;
                    stats.free_throws_made = made_count;
                }
                ShotKind::TwoPoint | ShotKind::ThreePoint => {
                    stats.field_goals_attempted = 1;
                    stats.field_goals_made = made_count;
                    if shot_kind == ShotKind::ThreePoint {
                        stats.three_point_attempted = 1;
                        stats.three_point_made = made_count;
                    } else {
                        stats.two_point_attempted = 1;
                        stats.two_point_made = made_count;
                    }
                    delta.period_fg_attempted = 1;
                    delta.period_fg_made = made_count;
                }
            }
            if made {
                stats.points = shot_kind.points();
            }
        }
        EventKind::Rebound => match event.rebound_kind.unwrap_or(ReboundKind::Defensive) {
            ReboundKind::Offensive => stats.rebounds_offensive = 1,
            ReboundKind::Defensive => stats.rebounds_defensive = 1,
        },
        EventKind::Assist => stats.assists = 1,
        EventKind::Steal => stats.steals = 1,
        EventKind::Block => stats.blocks = 1,
        EventKind::Turnover => stats.turnovers = 1,
        EventKind::Foul => stats.fouls = 1,
        EventKind::Substitution | EventKind::Timeout | EventKind::GameStart | EventKind::GameEnd => {}
    }

    delta
}
