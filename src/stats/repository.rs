use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{GameAggregates, PeriodTally, PlayerGameAggregate, StatLine, TeamGameAggregate};
use super::StatsError;
use crate::event::{EventFields, EventKind, GameEvent, Period};
use crate::shared::{EventId, GameId, PlayerId};

/// Event mutation committed together with a game's aggregate table.
///
/// Updates and deletes carry the version the caller read; the commit is refused
/// if the stored event has moved on since.
#[derive(Debug, Clone)]
pub enum EventWrite {
    Insert(GameEvent),
    Update { previous: GameEvent, next: GameEvent },
    Delete(GameEvent),
}

impl EventWrite {
    fn event_id(&self) -> EventId {
        match self {
            EventWrite::Insert(event) | EventWrite::Delete(event) => event.id,
            EventWrite::Update { next, .. } => next.id,
        }
    }

    fn expected_version(&self) -> Option<&GameEvent> {
        match self {
            EventWrite::Insert(_) => None,
            EventWrite::Update { previous, .. } => Some(previous),
            EventWrite::Delete(event) => Some(event),
        }
    }
}

/// Folds one event mutation into a game's current aggregate table
pub type AggregateUpdate<'a> = dyn Fn(&mut GameAggregates) -> Result<(), StatsError> + Send + Sync + 'a;

/// Builds a game's aggregate table from its live events in creation order
pub type AggregateReplay<'a> = dyn Fn(&[GameEvent]) -> Result<GameAggregates, StatsError> + Send + Sync + 'a;

/// A game's live events and aggregate table as of one instant
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub events: Vec<GameEvent>,
    pub aggregates: GameAggregates,
}

fn ensure_current(stored: &GameEvent, expected: &GameEvent) -> Result<(), StatsError> {
    if stored.sequence != expected.sequence || stored.fields != expected.fields {
        warn!(event_id = stored.id, "Stored event differs from the version being replaced");
        return Err(StatsError::StaleEvent(stored.id));
    }
    Ok(())
}

/// Event log plus the aggregate rows derived from it.
///
/// `commit` is the only write path for events. The repository loads the game's
/// current table, runs `update` on it and stores the event mutation with the
/// result, all under one exclusive hold on the game. Either both land or
/// neither does.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Allocates an event id and its creation sequence number
    async fn next_event_identity(&self) -> Result<(EventId, i64), StatsError>;
    async fn get_event(
        &self,
        game_id: GameId,
        event_id: EventId,
    ) -> Result<Option<GameEvent>, StatsError>;
    /// Live events of a game in creation order
    async fn list_events(&self, game_id: GameId) -> Result<Vec<GameEvent>, StatsError>;
    /// Live events naming the player as primary or second player, across games
    async fn list_player_events(&self, player_id: PlayerId) -> Result<Vec<GameEvent>, StatsError>;
    /// Player and team rows of a game, read from one consistent state
    async fn load_aggregates(&self, game_id: GameId) -> Result<GameAggregates, StatsError>;
    /// Events and aggregate rows of a game, read from one consistent state
    async fn load_snapshot(&self, game_id: GameId) -> Result<GameSnapshot, StatsError>;
    async fn commit(
        &self,
        game_id: GameId,
        write: EventWrite,
        update: &AggregateUpdate<'_>,
    ) -> Result<(), StatsError>;
    /// Replaces a game's whole aggregate table with `replay` of its live
    /// events, leaving the events alone
    async fn rebuild_aggregates(
        &self,
        game_id: GameId,
        replay: &AggregateReplay<'_>,
    ) -> Result<GameSnapshot, StatsError>;
    async fn player_rows(&self, player_id: PlayerId) -> Result<Vec<PlayerGameAggregate>, StatsError>;
    async fn team_rows(&self, team_id: &str) -> Result<Vec<TeamGameAggregate>, StatsError>;
    /// Every team row of the given games, both sides
    async fn team_rows_for_games(
        &self,
        game_ids: &[GameId],
    ) -> Result<Vec<TeamGameAggregate>, StatsError>;
}

#[derive(Debug, Default)]
struct Ledger {
    events: BTreeMap<EventId, GameEvent>,
    aggregates: HashMap<GameId, GameAggregates>,
    next_id: i64,
}

impl Ledger {
    fn table(&self, game_id: GameId) -> GameAggregates {
        self.aggregates
            .get(&game_id)
            .cloned()
            .unwrap_or_else(|| GameAggregates::new(game_id))
    }

    fn game_events(&self, game_id: GameId) -> Vec<GameEvent> {
        let mut events: Vec<GameEvent> = self
            .events
            .values()
            .filter(|event| event.game_id == game_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.sequence, event.id));
        events
    }

    fn stored(&self, game_id: GameId, event_id: EventId) -> Option<&GameEvent> {
        self.events
            .get(&event_id)
            .filter(|event| event.game_id == game_id)
    }
}

/// In-memory implementation of StatsRepository for development and testing.
/// One lock covers events and aggregates, so a commit is atomic.
#[derive(Debug, Default)]
pub struct InMemoryStatsRepository {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live events across all games
    pub async fn event_count(&self) -> usize {
        self.ledger.read().await.events.len()
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn next_event_identity(&self) -> Result<(EventId, i64), StatsError> {
        let mut ledger = self.ledger.write().await;
        ledger.next_id += 1;
        Ok((ledger.next_id, ledger.next_id))
    }

    async fn get_event(
        &self,
        game_id: GameId,
        event_id: EventId,
    ) -> Result<Option<GameEvent>, StatsError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.stored(game_id, event_id).cloned())
    }

    async fn list_events(&self, game_id: GameId) -> Result<Vec<GameEvent>, StatsError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.game_events(game_id))
    }

    async fn list_player_events(&self, player_id: PlayerId) -> Result<Vec<GameEvent>, StatsError> {
        let ledger = self.ledger.read().await;
        let mut events: Vec<GameEvent> = ledger
            .events
            .values()
            .filter(|event| event.fields.involves_player(player_id))
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.game_id, event.sequence));
        Ok(events)
    }

    async fn load_aggregates(&self, game_id: GameId) -> Result<GameAggregates, StatsError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.table(game_id))
    }

    async fn load_snapshot(&self, game_id: GameId) -> Result<GameSnapshot, StatsError> {
        let ledger = self.ledger.read().await;
        Ok(GameSnapshot {
            events: ledger.game_events(game_id),
            aggregates: ledger.table(game_id),
        })
    }

    #[instrument(skip(self, write, update), fields(event_id = write.event_id()))]
    async fn commit(
        &self,
        game_id: GameId,
        write: EventWrite,
        update: &AggregateUpdate<'_>,
    ) -> Result<(), StatsError> {
        let mut ledger = self.ledger.write().await;

        if let Some(expected) = write.expected_version() {
            if let Some(stored) = ledger.stored(game_id, expected.id) {
                ensure_current(stored, expected)?;
            }
        }
        let mut table = ledger.table(game_id);
        update(&mut table)?;

        match write {
            EventWrite::Insert(event) => {
                if ledger.events.contains_key(&event.id) {
                    warn!(event_id = event.id, "Event already exists in memory");
                    return Err(StatsError::Repository(format!(
                        "event {} already exists",
                        event.id
                    )));
                }
                ledger.events.insert(event.id, event);
            }
            EventWrite::Update { next, .. } => {
                let stored = ledger
                    .events
                    .get_mut(&next.id)
                    .filter(|stored| stored.game_id == game_id)
                    .ok_or(StatsError::EventNotFound(next.id))?;
                *stored = next;
            }
            EventWrite::Delete(event) => {
                if ledger.stored(game_id, event.id).is_none() {
                    return Err(StatsError::EventNotFound(event.id));
                }
                ledger.events.remove(&event.id);
            }
        }
        ledger.aggregates.insert(game_id, table);

        debug!(game_id, "Event and aggregates committed in memory");
        Ok(())
    }

    async fn rebuild_aggregates(
        &self,
        game_id: GameId,
        replay: &AggregateReplay<'_>,
    ) -> Result<GameSnapshot, StatsError> {
        let mut ledger = self.ledger.write().await;
        let events = ledger.game_events(game_id);
        let aggregates = replay(&events)?;
        ledger.aggregates.insert(game_id, aggregates.clone());

        debug!(game_id, "Aggregate table replaced in memory");
        Ok(GameSnapshot { events, aggregates })
    }

    async fn player_rows(&self, player_id: PlayerId) -> Result<Vec<PlayerGameAggregate>, StatsError> {
        let ledger = self.ledger.read().await;
        let mut rows: Vec<PlayerGameAggregate> = ledger
            .aggregates
            .values()
            .filter_map(|table| table.players.get(&player_id).cloned())
            .collect();
        rows.sort_by_key(|row| row.game_id);
        Ok(rows)
    }

    async fn team_rows(&self, team_id: &str) -> Result<Vec<TeamGameAggregate>, StatsError> {
        let ledger = self.ledger.read().await;
        let mut rows: Vec<TeamGameAggregate> = ledger
            .aggregates
            .values()
            .filter_map(|table| table.teams.get(team_id).cloned())
            .collect();
        rows.sort_by_key(|row| row.game_id);
        Ok(rows)
    }

    async fn team_rows_for_games(
        &self,
        game_ids: &[GameId],
    ) -> Result<Vec<TeamGameAggregate>, StatsError> {
        let ledger = self.ledger.read().await;
        Ok(game_ids
            .iter()
            .filter_map(|game_id| ledger.aggregates.get(game_id))
            .flat_map(|table| table.teams.values().cloned())
            .collect())
    }
}

/// PostgreSQL implementation over the `game_events`, `player_game_stats` and
/// `team_game_stats` tables. Counting columns are BIGINT, period maps JSONB.
pub struct PostgresStatsRepository {
    pool: PgPool,
}

impl PostgresStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str = "id, game_id, sequence, kind, period, clock_seconds, player_id, \
    second_player_id, team_id, shot_kind, rebound_kind, court_x, court_y, confidence, \
    camera_id, video_offset_seconds, home_score_after, away_score_after, created_at";

fn player_columns() -> String {
    format!(
        "game_id, player_id, team_id, {}, points_by_period",
        StatLine::FIELDS.join(", ")
    )
}

fn team_columns() -> String {
    format!(
        "game_id, team_id, {}, points_by_period, fg_made_by_period, fg_attempted_by_period",
        StatLine::FIELDS.join(", ")
    )
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StatsError {
    move |e| {
        warn!(error = %e, "{}", context);
        StatsError::Repository(e.to_string())
    }
}

fn decode_error(column: &str, detail: impl std::fmt::Display) -> StatsError {
    warn!(column, %detail, "Failed to decode stored value");
    StatsError::Repository(format!("column {}: {}", column, detail))
}

fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> Result<Option<T>, StatsError>
where
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = row.try_get(column).map_err(db_error("Failed to read event row"))?;
    raw.map(|value| value.parse::<T>().map_err(|e| decode_error(column, e)))
        .transpose()
}

fn unsigned(row: &PgRow, column: &str) -> Result<Option<u32>, StatsError> {
    let raw: Option<i32> = row.try_get(column).map_err(db_error("Failed to read event row"))?;
    raw.map(|value| u32::try_from(value).map_err(|e| decode_error(column, e)))
        .transpose()
}

fn event_from_row(row: &PgRow) -> Result<GameEvent, StatsError> {
    let read = db_error("Failed to read event row");
    let kind: String = row.try_get("kind").map_err(&read)?;
    let period = parse_column::<Period>(row, "period")?
        .ok_or_else(|| decode_error("period", "missing"))?;
    let clock_seconds =
        unsigned(row, "clock_seconds")?.ok_or_else(|| decode_error("clock_seconds", "missing"))?;

    let fields = EventFields {
        kind: EventKind::from_code(&kind)?,
        period,
        clock_seconds,
        player_id: row.try_get("player_id").map_err(&read)?,
        second_player_id: row.try_get("second_player_id").map_err(&read)?,
        team_id: row.try_get("team_id").map_err(&read)?,
        shot_kind: parse_column(row, "shot_kind")?,
        rebound_kind: parse_column(row, "rebound_kind")?,
        court_x: row.try_get("court_x").map_err(&read)?,
        court_y: row.try_get("court_y").map_err(&read)?,
        confidence: row.try_get("confidence").map_err(&read)?,
        camera_id: row.try_get("camera_id").map_err(&read)?,
        video_offset_seconds: row.try_get("video_offset_seconds").map_err(&read)?,
        home_score_after: unsigned(row, "home_score_after")?,
        away_score_after: unsigned(row, "away_score_after")?,
    };

    Ok(GameEvent {
        id: row.try_get("id").map_err(&read)?,
        game_id: row.try_get("game_id").map_err(&read)?,
        sequence: row.try_get("sequence").map_err(&read)?,
        fields,
        created_at: row.try_get("created_at").map_err(&read)?,
    })
}

fn stat_line_from_row(row: &PgRow) -> Result<StatLine, StatsError> {
    StatLine::try_from_fields(|column| {
        let value: i64 = row
            .try_get(column)
            .map_err(db_error("Failed to read aggregate row"))?;
        u32::try_from(value).map_err(|e| decode_error(column, e))
    })
}

fn tally_from_row(row: &PgRow, column: &str) -> Result<PeriodTally, StatsError> {
    let Json(map): Json<BTreeMap<Period, u32>> = row
        .try_get(column)
        .map_err(db_error("Failed to read aggregate row"))?;
    Ok(PeriodTally::from(map))
}

fn player_row_from_row(row: &PgRow) -> Result<PlayerGameAggregate, StatsError> {
    let read = db_error("Failed to read aggregate row");
    Ok(PlayerGameAggregate {
        game_id: row.try_get("game_id").map_err(&read)?,
        player_id: row.try_get("player_id").map_err(&read)?,
        team_id: row.try_get("team_id").map_err(&read)?,
        stats: stat_line_from_row(row)?,
        points_by_period: tally_from_row(row, "points_by_period")?,
    })
}

fn team_row_from_row(row: &PgRow) -> Result<TeamGameAggregate, StatsError> {
    let read = db_error("Failed to read aggregate row");
    Ok(TeamGameAggregate {
        game_id: row.try_get("game_id").map_err(&read)?,
        team_id: row.try_get("team_id").map_err(&read)?,
        stats: stat_line_from_row(row)?,
        points_by_period: tally_from_row(row, "points_by_period")?,
        fg_made_by_period: tally_from_row(row, "fg_made_by_period")?,
        fg_attempted_by_period: tally_from_row(row, "fg_attempted_by_period")?,
    })
}

fn tally_json(tally: &PeriodTally) -> Json<BTreeMap<Period, u32>> {
    Json(tally.as_map().clone())
}

async fn write_event(
    conn: &mut PgConnection,
    game_id: GameId,
    write: &EventWrite,
) -> Result<(), StatsError> {
    let (sql, event) = match write {
        EventWrite::Delete(event) => {
            let result = sqlx::query("DELETE FROM game_events WHERE id = $1 AND game_id = $2")
                .bind(event.id)
                .bind(game_id)
                .execute(&mut *conn)
                .await
                .map_err(db_error("Failed to delete event"))?;
            if result.rows_affected() == 0 {
                return Err(StatsError::EventNotFound(event.id));
            }
            return Ok(());
        }
        EventWrite::Insert(event) => (
            format!(
                "INSERT INTO game_events ({}) VALUES \
                 ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
                EVENT_COLUMNS
            ),
            event,
        ),
        EventWrite::Update { next, .. } => (
            "UPDATE game_events SET sequence = $3, kind = $4, period = $5, clock_seconds = $6, \
             player_id = $7, second_player_id = $8, team_id = $9, shot_kind = $10, \
             rebound_kind = $11, court_x = $12, court_y = $13, confidence = $14, camera_id = $15, \
             video_offset_seconds = $16, home_score_after = $17, away_score_after = $18, \
             created_at = $19 WHERE id = $1 AND game_id = $2"
                .to_string(),
            next,
        ),
    };

    let fields = &event.fields;
    let result = sqlx::query(&sql)
        .bind(event.id)
        .bind(event.game_id)
        .bind(event.sequence)
        .bind(fields.kind.as_ref())
        .bind(fields.period.as_ref())
        .bind(fields.clock_seconds as i32)
        .bind(fields.player_id)
        .bind(fields.second_player_id)
        .bind(&fields.team_id)
        .bind(fields.shot_kind.map(|kind| kind.to_string()))
        .bind(fields.rebound_kind.map(|kind| kind.to_string()))
        .bind(fields.court_x)
        .bind(fields.court_y)
        .bind(fields.confidence)
        .bind(&fields.camera_id)
        .bind(fields.video_offset_seconds)
        .bind(fields.home_score_after.map(|score| score as i32))
        .bind(fields.away_score_after.map(|score| score as i32))
        .bind(event.created_at)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to write event"))?;

    if result.rows_affected() == 0 {
        return Err(StatsError::EventNotFound(event.id));
    }
    Ok(())
}

/// Holds the game's advisory lock until the surrounding transaction ends.
/// Every writer of a game takes it, in this process or any other.
async fn lock_game(conn: &mut PgConnection, game_id: GameId) -> Result<(), StatsError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(game_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to lock game"))?;
    Ok(())
}

/// Opens a read-only transaction that sees a single committed state
async fn begin_snapshot(pool: &PgPool) -> Result<Transaction<'static, Postgres>, StatsError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to set snapshot isolation"))?;
    Ok(tx)
}

async fn fetch_stored_event(
    conn: &mut PgConnection,
    game_id: GameId,
    event_id: EventId,
) -> Result<Option<GameEvent>, StatsError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM game_events WHERE id = $1 AND game_id = $2 FOR UPDATE",
        EVENT_COLUMNS
    ))
    .bind(event_id)
    .bind(game_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("Failed to fetch event"))?;

    row.as_ref().map(event_from_row).transpose()
}

async fn fetch_events(conn: &mut PgConnection, game_id: GameId) -> Result<Vec<GameEvent>, StatsError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM game_events WHERE game_id = $1 ORDER BY sequence, id",
        EVENT_COLUMNS
    ))
    .bind(game_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to list events"))?;

    debug!(game_id, count = rows.len(), "Events fetched from database");
    rows.iter().map(event_from_row).collect()
}

async fn fetch_aggregates(
    conn: &mut PgConnection,
    game_id: GameId,
) -> Result<GameAggregates, StatsError> {
    let players = sqlx::query(&format!(
        "SELECT {} FROM player_game_stats WHERE game_id = $1",
        player_columns()
    ))
    .bind(game_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to load player aggregate rows"))?;
    let teams = sqlx::query(&format!(
        "SELECT {} FROM team_game_stats WHERE game_id = $1",
        team_columns()
    ))
    .bind(game_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to load team aggregate rows"))?;

    Ok(GameAggregates::from_rows(
        game_id,
        players.iter().map(player_row_from_row).collect::<Result<_, _>>()?,
        teams.iter().map(team_row_from_row).collect::<Result<_, _>>()?,
    ))
}

/// Deletes the game's aggregate rows and inserts `aggregates` in their place
async fn write_aggregates(
    conn: &mut PgConnection,
    game_id: GameId,
    aggregates: &GameAggregates,
) -> Result<(), StatsError> {
    for table in ["player_game_stats", "team_game_stats"] {
        sqlx::query(&format!("DELETE FROM {} WHERE game_id = $1", table))
            .bind(game_id)
            .execute(&mut *conn)
            .await
            .map_err(db_error("Failed to clear aggregate rows"))?;
    }

    if !aggregates.players.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO player_game_stats ({}) ", player_columns()));
        builder.push_values(aggregates.player_rows(), |mut values, row| {
            values
                .push_bind(row.game_id)
                .push_bind(row.player_id)
                .push_bind(row.team_id.clone());
            for (_, count) in row.stats.values() {
                values.push_bind(i64::from(count));
            }
            values.push_bind(tally_json(&row.points_by_period));
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(db_error("Failed to insert player aggregate rows"))?;
    }

    if !aggregates.teams.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO team_game_stats ({}) ", team_columns()));
        builder.push_values(aggregates.team_rows(), |mut values, row| {
            values
                .push_bind(row.game_id)
                .push_bind(row.team_id.clone());
            for (_, count) in row.stats.values() {
                values.push_bind(i64::from(count));
            }
            values
                .push_bind(tally_json(&row.points_by_period))
                .push_bind(tally_json(&row.fg_made_by_period))
                .push_bind(tally_json(&row.fg_attempted_by_period));
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(db_error("Failed to insert team aggregate rows"))?;
    }

    Ok(())
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    #[instrument(skip(self))]
    async fn next_event_identity(&self) -> Result<(EventId, i64), StatsError> {
        let id: i64 = sqlx::query_scalar("SELECT nextval('game_events_id_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to allocate event id"))?;
        Ok((id, id))
    }

    #[instrument(skip(self))]
    async fn get_event(
        &self,
        game_id: GameId,
        event_id: EventId,
    ) -> Result<Option<GameEvent>, StatsError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM game_events WHERE id = $1 AND game_id = $2",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch event"))?;

        row.as_ref().map(event_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_events(&self, game_id: GameId) -> Result<Vec<GameEvent>, StatsError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        fetch_events(&mut *conn, game_id).await
    }

    #[instrument(skip(self))]
    async fn list_player_events(&self, player_id: PlayerId) -> Result<Vec<GameEvent>, StatsError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM game_events WHERE player_id = $1 OR second_player_id = $1 \
             ORDER BY game_id, sequence",
            EVENT_COLUMNS
        ))
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list player events"))?;

        rows.iter().map(event_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn load_aggregates(&self, game_id: GameId) -> Result<GameAggregates, StatsError> {
        let mut tx = begin_snapshot(&self.pool).await?;
        let aggregates = fetch_aggregates(&mut *tx, game_id).await?;
        tx.commit()
            .await
            .map_err(db_error("Failed to close snapshot"))?;
        Ok(aggregates)
    }

    #[instrument(skip(self))]
    async fn load_snapshot(&self, game_id: GameId) -> Result<GameSnapshot, StatsError> {
        let mut tx = begin_snapshot(&self.pool).await?;
        let events = fetch_events(&mut *tx, game_id).await?;
        let aggregates = fetch_aggregates(&mut *tx, game_id).await?;
        tx.commit()
            .await
            .map_err(db_error("Failed to close snapshot"))?;
        Ok(GameSnapshot { events, aggregates })
    }

    #[instrument(skip(self, write, update), fields(event_id = write.event_id()))]
    async fn commit(
        &self,
        game_id: GameId,
        write: EventWrite,
        update: &AggregateUpdate<'_>,
    ) -> Result<(), StatsError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to open transaction"))?;
        lock_game(&mut *tx, game_id).await?;

        if let Some(expected) = write.expected_version() {
            if let Some(stored) = fetch_stored_event(&mut *tx, game_id, expected.id).await? {
                ensure_current(&stored, expected)?;
            }
        }
        let mut table = fetch_aggregates(&mut *tx, game_id).await?;
        update(&mut table)?;

        write_event(&mut *tx, game_id, &write).await?;
        write_aggregates(&mut *tx, game_id, &table).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit event and aggregates"))?;
        debug!(game_id, "Event and aggregates committed in database");
        Ok(())
    }

    #[instrument(skip(self, replay))]
    async fn rebuild_aggregates(
        &self,
        game_id: GameId,
        replay: &AggregateReplay<'_>,
    ) -> Result<GameSnapshot, StatsError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to open transaction"))?;
        lock_game(&mut *tx, game_id).await?;

        let events = fetch_events(&mut *tx, game_id).await?;
        let aggregates = replay(&events)?;
        write_aggregates(&mut *tx, game_id, &aggregates).await?;
        tx.commit()
            .await
            .map_err(db_error("Failed to commit rebuilt aggregates"))?;

        debug!(game_id, "Aggregate table replaced in database");
        Ok(GameSnapshot { events, aggregates })
    }

    #[instrument(skip(self))]
    async fn player_rows(&self, player_id: PlayerId) -> Result<Vec<PlayerGameAggregate>, StatsError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM player_game_stats WHERE player_id = $1 ORDER BY game_id",
            player_columns()
        ))
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch player rows"))?;

        rows.iter().map(player_row_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn team_rows(&self, team_id: &str) -> Result<Vec<TeamGameAggregate>, StatsError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team_game_stats WHERE team_id = $1 ORDER BY game_id",
            team_columns()
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch team rows"))?;

        rows.iter().map(team_row_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn team_rows_for_games(
        &self,
        game_ids: &[GameId],
    ) -> Result<Vec<TeamGameAggregate>, StatsError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team_game_stats WHERE game_id = ANY($1) ORDER BY game_id, team_id",
            team_columns()
        ))
        .bind(game_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch team rows for games"))?;

        rows.iter().map(team_row_from_row).collect()
    }
}
