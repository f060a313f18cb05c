#![allow(dead_code)]

use courtstats::{
    event::{EventFields, EventKind, Period, ReboundKind, ShotKind},
    shared::PlayerId,
};

// ============================================================================
// Event Setup Utilities
// ============================================================================

/// Fluent builder for event drafts. Defaults: Q1, 400 seconds left, full confidence.
pub struct EventBuilder {
    fields: EventFields,
}

impl EventBuilder {
    pub fn new(kind: EventKind, team_id: &str) -> Self {
        Self {
            fields: EventFields::new(kind, Period::Q1, 400, team_id),
        }
    }

    fn by(kind: EventKind, player_id: PlayerId, team_id: &str) -> Self {
        Self::new(kind, team_id).player(player_id)
    }

    /// Made two-pointer unless changed with `three` or `free_throw`
    pub fn shot_made(player_id: PlayerId, team_id: &str) -> Self {
        Self::by(EventKind::ShotMade, player_id, team_id).two()
    }

    pub fn shot_missed(player_id: PlayerId, team_id: &str) -> Self {
        Self::by(EventKind::ShotMissed, player_id, team_id).two()
    }

    pub fn rebound(player_id: PlayerId, team_id: &str) -> Self {
        Self::by(EventKind::Rebound, player_id, team_id)
    }

    pub fn assist(passer: PlayerId, scorer: PlayerId, team_id: &str) -> Self {
        Self::by(EventKind::Assist, passer, team_id).second_player(scorer)
    }

    pub fn substitution(out: PlayerId, into: PlayerId, team_id: &str) -> Self {
        Self::by(EventKind::Substitution, out, team_id).second_player(into)
    }

    pub fn counter(kind: EventKind, player_id: PlayerId, team_id: &str) -> Self {
        Self::by(kind, player_id, team_id)
    }

    pub fn game_end(team_id: &str, home: u32, away: u32) -> Self {
        Self::new(EventKind::GameEnd, team_id)
            .period(Period::Q4)
            .clock(0)
            .score(home, away)
    }

    pub fn player(mut self, player_id: PlayerId) -> Self {
        self.fields.player_id = Some(player_id);
        self
    }

    pub fn second_player(mut self, player_id: PlayerId) -> Self {
        self.fields.second_player_id = Some(player_id);
        self
    }

    pub fn two(mut self) -> Self {
        self.fields.shot_kind = Some(ShotKind::TwoPoint);
        self
    }

    pub fn three(mut self) -> Self {
        self.fields.shot_kind = Some(ShotKind::ThreePoint);
        self
    }

    pub fn free_throw(mut self) -> Self {
        self.fields.shot_kind = Some(ShotKind::FreeThrow);
        self
    }

    pub fn offensive(mut self) -> Self {
        self.fields.rebound_kind = Some(ReboundKind::Offensive);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.fields.court_x = Some(x);
        self.fields.court_y = Some(y);
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.fields.period = period;
        self
    }

    pub fn clock(mut self, seconds: u32) -> Self {
        self.fields.clock_seconds = seconds;
        self
    }

    pub fn score(mut self, home: u32, away: u32) -> Self {
        self.fields.home_score_after = Some(home);
        self.fields.away_score_after = Some(away);
        self
    }

    pub fn video(mut self, camera_id: &str, offset_seconds: f64) -> Self {
        self.fields.camera_id = Some(camera_id.to_string());
        self.fields.video_offset_seconds = Some(offset_seconds);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.fields.confidence = confidence;
        self
    }

    pub fn build(self) -> EventFields {
        self.fields
    }
}
