//! Seconds on court and plus/minus, replayed from substitutions, and team
//! timeout counts.
//!
//! All of these are derived on read from the event log and never stored with
//! the aggregates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::event::{EventKind, GameEvent, Period, ShotKind};
use crate::game::Game;
use crate::shared::{PlayerId, TeamId};

/// Length of every period, overtime included
pub const PERIOD_SECONDS: u32 = 480;

/// Game seconds between two clock readings. The clock counts down.
pub fn elapsed_seconds(from: (Period, u32), to: (Period, u32)) -> u32 {
    let (from_period, from_clock) = from;
    let (to_period, to_clock) = to;
    if from_period == to_period {
        return from_clock.saturating_sub(to_clock);
    }
    if to_period < from_period {
        return 0;
    }
    let periods_between = to_period.index() - from_period.index() - 1;
    from_clock
        .saturating_add(periods_between.saturating_mul(PERIOD_SECONDS))
        .saturating_add(PERIOD_SECONDS.saturating_sub(to_clock))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtTime {
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub seconds_played: u32,
    pub plus_minus: i32,
    pub on_court: bool,
}

#[derive(Debug)]
struct Tracker {
    line: CourtTime,
    entered_at: Option<(Period, u32)>,
}

impl Tracker {
    fn new(player_id: PlayerId, team_id: &str) -> Self {
        Self {
            line: CourtTime {
                player_id,
                team_id: team_id.to_string(),
                seconds_played: 0,
                plus_minus: 0,
                on_court: false,
            },
            entered_at: None,
        }
    }

    fn leave(&mut self, at: (Period, u32)) {
        if let Some(entered_at) = self.entered_at.take() {
            self.line.seconds_played = self
                .line
                .seconds_played
                .saturating_add(elapsed_seconds(entered_at, at));
        }
        self.line.on_court = false;
    }
}

/// Replays `events` in game-clock order.
///
/// A substitution takes its primary player off the court and puts the second
/// player on. A made shot moves the plus/minus of every player on court:
/// up for the scoring side, down for the other. Players still on court when
/// the log ends are credited up to the last event.
pub fn replay(game: &Game, events: &[GameEvent]) -> Vec<CourtTime> {
    let mut ordered: Vec<&GameEvent> = events.iter().collect();
    ordered.sort_by(|a, b| a.chronological_cmp(b));

    let mut trackers: BTreeMap<PlayerId, Tracker> = BTreeMap::new();
    for event in &ordered {
        let fields = &event.fields;
        let at = (fields.period, fields.clock_seconds);

        match fields.kind {
            EventKind::Substitution => {
                if let Some(exiting) = fields.player_id {
                    trackers
                        .entry(exiting)
                        .or_insert_with(|| Tracker::new(exiting, &fields.team_id))
                        .leave(at);
                }
                if let Some(entering) = fields.second_player_id {
                    let tracker = trackers
                        .entry(entering)
                        .or_insert_with(|| Tracker::new(entering, &fields.team_id));
                    if !tracker.line.on_court {
                        tracker.entered_at = Some(at);
                        tracker.line.on_court = true;
                    }
                }
            }
            EventKind::ShotMade => {
                let Some(opponent) = game.opponent_of(&fields.team_id) else {
                    continue;
                };
                let points = fields.shot_kind.unwrap_or(ShotKind::TwoPoint).points() as i32;
                for tracker in trackers.values_mut().filter(|t| t.line.on_court) {
                    if tracker.line.team_id == fields.team_id {
                        tracker.line.plus_minus += points;
                    } else if tracker.line.team_id == opponent {
                        tracker.line.plus_minus -= points;
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(last) = ordered.last() {
        let end = (last.fields.period, last.fields.clock_seconds);
        for tracker in trackers.values_mut() {
            if let Some(entered_at) = tracker.entered_at {
                tracker.line.seconds_played = tracker
                    .line
                    .seconds_played
                    .saturating_add(elapsed_seconds(entered_at, end));
                tracker.entered_at = Some(end);
            }
        }
    }

    trackers.into_values().map(|tracker| tracker.line).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamTimeouts {
    pub team_id: TeamId,
    pub timeouts: u32,
}

/// Timeouts called by each side of `game`, home first. Both teams are listed
/// even when they have not called one. Timeouts tagged to other teams are
/// ignored.
pub fn count_timeouts(game: &Game, events: &[GameEvent]) -> Vec<TeamTimeouts> {
    [&game.home_team_id, &game.away_team_id]
        .into_iter()
        .map(|team_id| TeamTimeouts {
            team_id: team_id.clone(),
            timeouts: events
                .iter()
                .filter(|event| {
                    event.fields.kind == EventKind::Timeout && &event.fields.team_id == team_id
                })
                .count() as u32,
        })
        .collect()
}
