use serde::{Deserialize, Serialize};

use super::derived::percentage;
use crate::event::{EventKind, GameEvent, Period, ShotKind};
use crate::shared::{round_one_decimal, EventId, PlayerId, TeamId};

/// Optional narrowing of a shot chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShotFilter {
    pub player_id: Option<PlayerId>,
    pub team_id: Option<TeamId>,
    pub period: Option<Period>,
}

impl ShotFilter {
    fn matches(&self, event: &GameEvent) -> bool {
        let fields = &event.fields;
        self.player_id
            .map_or(true, |player_id| fields.player_id == Some(player_id))
            && self
                .team_id
                .as_ref()
                .map_or(true, |team_id| &fields.team_id == team_id)
            && self.period.map_or(true, |period| fields.period == period)
    }
}

/// One located shot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotPoint {
    pub event_id: EventId,
    pub player_id: Option<PlayerId>,
    pub team_id: TeamId,
    pub period: Period,
    pub clock_seconds: u32,
    pub x: f64,
    pub y: f64,
    pub made: bool,
    pub shot_kind: Option<ShotKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotChart {
    pub shots: Vec<ShotPoint>,
    pub total_made: u32,
    pub total_attempted: u32,
    pub fg_pct: Option<f64>,
}

/// Collects shot events that carry both court coordinates, in game-clock order.
/// Shots tagged without a location are left out of the chart and its totals.
pub fn build(events: &[GameEvent], filter: &ShotFilter) -> ShotChart {
    let mut located: Vec<&GameEvent> = events
        .iter()
        .filter(|event| event.fields.kind.is_shot() && filter.matches(event))
        .filter(|event| event.fields.coordinates().is_some())
        .collect();
    located.sort_by(|a, b| a.chronological_cmp(b));

    let shots: Vec<ShotPoint> = located
        .into_iter()
        .filter_map(|event| {
            let (x, y) = event.fields.coordinates()?;
            Some(ShotPoint {
                event_id: event.id,
                player_id: event.fields.player_id,
                team_id: event.fields.team_id.clone(),
                period: event.fields.period,
                clock_seconds: event.fields.clock_seconds,
                x,
                y,
                made: event.fields.kind == EventKind::ShotMade,
                shot_kind: event.fields.shot_kind,
            })
        })
        .collect();

    let total_attempted = shots.len() as u32;
    let total_made = shots.iter().filter(|shot| shot.made).count() as u32;
    ShotChart {
        fg_pct: percentage(total_made, total_attempted).map(round_one_decimal),
        shots,
        total_made,
        total_attempted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventFields;

    fn shot(id: EventId, player: PlayerId, team: &str, made: bool, at: Option<(f64, f64)>) -> GameEvent {
        let kind = if made {
            EventKind::ShotMade
        } else {
            EventKind::ShotMissed
        };
        let mut fields = EventFields::new(kind, Period::Q1, 400 - id as u32, team);
        fields.player_id = Some(player);
        fields.shot_kind = Some(ShotKind::TwoPoint);
        if let Some((x, y)) = at {
            fields.court_x = Some(x);
            fields.court_y = Some(y);
        }
        GameEvent::new(id, 1, id, fields)
    }

    #[test]
    fn player_filter_keeps_only_their_located_shots() {
        let events = vec![
            shot(1, 7, "lakers", true, Some((10.0, 5.0))),
            shot(2, 7, "lakers", false, Some((24.0, 20.0))),
            shot(3, 8, "lakers", true, Some((25.0, 4.0))),
            shot(4, 7, "lakers", true, None),
        ];
        let filter = ShotFilter {
            player_id: Some(7),
            ..ShotFilter::default()
        };

        let chart = build(&events, &filter);
        assert_eq!(chart.total_attempted, 2);
        assert_eq!(chart.total_made, 1);
        assert_eq!(chart.fg_pct, Some(50.0));
        assert!(chart.shots.iter().all(|s| s.player_id == Some(7)));
        assert_eq!(chart.shots[0].event_id, 1);
    }

    #[test]
    fn non_shot_events_with_coordinates_are_ignored() {
        let mut steal = EventFields::new(EventKind::Steal, Period::Q1, 300, "lakers");
        steal.court_x = Some(3.0);
        steal.court_y = Some(3.0);
        let events = vec![GameEvent::new(1, 1, 1, steal)];

        let chart = build(&events, &ShotFilter::default());
        assert!(chart.shots.is_empty());
        assert_eq!(chart.fg_pct, None);
    }

    #[test]
    fn team_and_period_filters_combine() {
        let mut late = shot(3, 10, "celtics", true, Some((5.0, 5.0)));
        late.fields.period = Period::Q4;
        let events = vec![
            shot(1, 7, "lakers", true, Some((10.0, 5.0))),
            shot(2, 10, "celtics", false, Some((11.0, 5.0))),
            late,
        ];
        let filter = ShotFilter {
            team_id: Some("celtics".into()),
            period: Some(Period::Q4),
            ..ShotFilter::default()
        };
        let chart = build(&events, &filter);
        assert_eq!(chart.total_attempted, 1);
        assert_eq!(chart.fg_pct, Some(100.0));
    }
}
