use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::shared::{EventId, GameId, PlayerId, TeamId};
use crate::stats::StatsError;

/// Kinds of events a tagger can record during a game
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ShotMade,
    ShotMissed,
    Foul,
    /// Primary player exits, second player enters
    Substitution,
    Timeout,
    Turnover,
    Rebound,
    Steal,
    Block,
    /// Primary player is the passer, second player the scorer
    Assist,
    GameStart,
    GameEnd,
}

impl EventKind {
    /// Parses a stored event kind, surfacing unrecognized codes instead of dropping them.
    pub fn from_code(code: &str) -> Result<Self, StatsError> {
        code.parse()
            .map_err(|_| StatsError::UnknownEventKind(code.to_string()))
    }

    pub fn is_shot(self) -> bool {
        matches!(self, EventKind::ShotMade | EventKind::ShotMissed)
    }
}

/// Game periods in playing order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum Period {
    Q1,
    Q2,
    Q3,
    Q4,
    #[serde(rename = "OT1")]
    #[strum(serialize = "OT1")]
    Ot1,
    #[serde(rename = "OT2")]
    #[strum(serialize = "OT2")]
    Ot2,
}

impl Period {
    /// Zero-based position of the period in the game
    pub fn index(self) -> u32 {
        self as u32
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ShotKind {
    TwoPoint,
    ThreePoint,
    FreeThrow,
}

impl ShotKind {
    /// Points awarded when a shot of this kind is made
    pub fn points(self) -> u32 {
        match self {
            ShotKind::TwoPoint => 2,
            ShotKind::ThreePoint => 3,
            ShotKind::FreeThrow => 1,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReboundKind {
    Offensive,
    Defensive,
}

/// The mutable part of an event. Everything the stats engine reads lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    pub kind: EventKind,
    pub period: Period,
    /// Seconds remaining in the period
    pub clock_seconds: u32,
    pub player_id: Option<PlayerId>,
    pub second_player_id: Option<PlayerId>,
    pub team_id: TeamId,
    pub shot_kind: Option<ShotKind>,
    pub rebound_kind: Option<ReboundKind>,
    pub court_x: Option<f64>, // feet, 0-50
    pub court_y: Option<f64>, // feet, 0-47
    pub confidence: f64,
    pub camera_id: Option<String>,
    pub video_offset_seconds: Option<f64>,
    pub home_score_after: Option<u32>,
    pub away_score_after: Option<u32>,
}

impl EventFields {
    /// Minimal field set for an event; everything optional starts unset.
    pub fn new(kind: EventKind, period: Period, clock_seconds: u32, team_id: &str) -> Self {
        Self {
            kind,
            period,
            clock_seconds,
            player_id: None,
            second_player_id: None,
            team_id: team_id.to_string(),
            shot_kind: None,
            rebound_kind: None,
            court_x: None,
            court_y: None,
            confidence: 1.0,
            camera_id: None,
            video_offset_seconds: None,
            home_score_after: None,
            away_score_after: None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.court_x?, self.court_y?))
    }

    pub fn score_snapshot(&self) -> Option<ScoreSnapshot> {
        Some(ScoreSnapshot {
            home: self.home_score_after?,
            away: self.away_score_after?,
        })
    }

    /// Whether the event is linked to a camera and a position in its footage
    pub fn has_video_link(&self) -> bool {
        self.camera_id.is_some() && self.video_offset_seconds.is_some()
    }

    pub fn involves_player(&self, player_id: PlayerId) -> bool {
        self.player_id == Some(player_id) || self.second_player_id == Some(player_id)
    }
}

/// A stored event: immutable identity plus its current field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: EventId,
    pub game_id: GameId,
    /// Creation order within the event store; rebuilds replay in this order
    pub sequence: i64,
    #[serde(flatten)]
    pub fields: EventFields,
    pub created_at: DateTime<Utc>,
}

impl GameEvent {
    pub fn new(id: EventId, game_id: GameId, sequence: i64, fields: EventFields) -> Self {
        Self {
            id,
            game_id,
            sequence,
            fields,
            created_at: Utc::now(),
        }
    }

    /// Same identity, different field values. Used for edits.
    pub fn with_fields(&self, fields: EventFields) -> Self {
        Self {
            fields,
            ..self.clone()
        }
    }

    /// Game-clock order: period ascending, clock descending (it counts down),
    /// then creation sequence for events tagged at the same instant.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.fields
            .period
            .cmp(&other.fields.period)
            .then_with(|| other.fields.clock_seconds.cmp(&self.fields.clock_seconds))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Sorts events into game-clock order in place
pub fn sort_chronologically(events: &mut [GameEvent]) {
    events.sort_by(|a, b| a.chronological_cmp(b));
}

/// Home/away score recorded after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub home: u32,
    pub away: u32,
}

/// Score snapshot of the chronologically last event that carries one
pub fn final_score(events: &[GameEvent]) -> Option<ScoreSnapshot> {
    events
        .iter()
        .filter(|event| event.fields.score_snapshot().is_some())
        .max_by(|a, b| a.chronological_cmp(b))
        .and_then(|event| event.fields.score_snapshot())
}

/// Partial update of an event's fields. Unset fields keep their current value.
///
/// Fields that are optional on the event take a double `Option`: `None` leaves
/// the value alone, `Some(None)` clears it. In JSON an absent key keeps and an
/// explicit `null` clears.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub player_id: Option<Option<PlayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub second_player_id: Option<Option<PlayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub shot_kind: Option<Option<ShotKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub rebound_kind: Option<Option<ReboundKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub court_x: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub court_y: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub camera_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub video_offset_seconds: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub home_score_after: Option<Option<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub away_score_after: Option<Option<u32>>,
}

/// A present key is always `Some`, so an explicit `null` becomes `Some(None)`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn overwrite<T: Clone>(slot: &mut Option<T>, change: &Option<Option<T>>) {
    if let Some(value) = change {
        *slot = value.clone();
    }
}

impl EventPatch {
    pub fn apply_to(&self, current: &EventFields) -> EventFields {
        let mut next = current.clone();
        if let Some(kind) = self.kind {
            next.kind = kind;
        }
        if let Some(period) = self.period {
            next.period = period;
        }
        if let Some(clock) = self.clock_seconds {
            next.clock_seconds = clock;
        }
        if let Some(team_id) = &self.team_id {
            next.team_id = team_id.clone();
        }
        if let Some(confidence) = self.confidence {
            next.confidence = confidence;
        }
        overwrite(&mut next.player_id, &self.player_id);
        overwrite(&mut next.second_player_id, &self.second_player_id);
        overwrite(&mut next.shot_kind, &self.shot_kind);
        overwrite(&mut next.rebound_kind, &self.rebound_kind);
        overwrite(&mut next.court_x, &self.court_x);
        overwrite(&mut next.court_y, &self.court_y);
        overwrite(&mut next.camera_id, &self.camera_id);
        overwrite(&mut next.video_offset_seconds, &self.video_offset_seconds);
        overwrite(&mut next.home_score_after, &self.home_score_after);
        overwrite(&mut next.away_score_after, &self.away_score_after);
        next
    }
}

/// Optional narrowing for event listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub period: Option<Period>,
    /// Matches either the primary or the second player
    pub player_id: Option<PlayerId>,
}

impl EventFilter {
    pub fn matches(&self, event: &GameEvent) -> bool {
        self.kind.map_or(true, |kind| event.fields.kind == kind)
            && self.period.map_or(true, |period| event.fields.period == period)
            && self
                .player_id
                .map_or(true, |player_id| event.fields.involves_player(player_id))
    }
}
