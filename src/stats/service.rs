use futures::future::try_join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use crate::{
    event::{final_score, sort_chronologically, EventFields, EventFilter, EventPatch, GameEvent},
    game::{Game, GameRepository},
    shared::{EventId, GameId, PlayerId},
};

use super::{
    court_time::{self, CourtTime, TeamTimeouts},
    derived::{PossessionModel, RatingWeights, ShootingSplits},
    models::{
        GameAggregates, PlayerGameAggregate, PlayerGameLine, PlayerSeasonLine, TeamGameAggregate,
        TeamGameLine, TeamSeasonLine,
    },
    rebuild::{self, ConsistencyReport},
    repository::{EventWrite, GameSnapshot, StatsRepository},
    season::{self, GameResult},
    shot_chart::{self, ShotChart, ShotFilter},
    StatsError,
};

/// Keeps a game's aggregate rows in step with its event log and serves the
/// read-side views.
///
/// Writes to one game run one at a time under that game's lock; different
/// games never wait on each other. Reads take no lock.
pub struct StatsService {
    repository: Arc<dyn StatsRepository>,
    games: Arc<dyn GameRepository>,
    possession_model: PossessionModel,
    rating_weights: RatingWeights,
    game_mutexes: Arc<RwLock<HashMap<GameId, Arc<AsyncMutex<()>>>>>,
}

impl StatsService {
    pub fn builder(
        repository: Arc<dyn StatsRepository>,
        games: Arc<dyn GameRepository>,
    ) -> StatsServiceBuilder {
        StatsServiceBuilder::new(repository, games)
    }

    pub fn possession_model(&self) -> PossessionModel {
        self.possession_model
    }

    // Event notifications

    /// Folds a newly stored event into its game's aggregates.
    #[instrument(skip(self, event), fields(game_id = event.game_id, event_id = event.id))]
    pub async fn apply_create(&self, event: GameEvent) -> Result<(), StatsError> {
        let game_lock = self.game_lock(event.game_id).await;
        let _guard = game_lock.lock().await;

        self.create_locked(event).await.map(|_| ())
    }

    /// Swaps `old`'s contribution for `new`'s. Both must be the same event,
    /// and `old` must still match the stored version or the call fails with
    /// `StaleEvent`.
    #[instrument(skip(self, old, new), fields(game_id = old.game_id, event_id = old.id))]
    pub async fn apply_update(&self, old: &GameEvent, new: GameEvent) -> Result<(), StatsError> {
        if old.id != new.id || old.game_id != new.game_id {
            return Err(StatsError::MissingMembership(format!(
                "update pairs event {} of game {} with event {} of game {}",
                old.id, old.game_id, new.id, new.game_id
            )));
        }
        let game_lock = self.game_lock(old.game_id).await;
        let _guard = game_lock.lock().await;

        self.update_locked(old, new).await.map(|_| ())
    }

    #[instrument(skip(self, event), fields(game_id = event.game_id, event_id = event.id))]
    pub async fn apply_delete(&self, event: &GameEvent) -> Result<(), StatsError> {
        let game_lock = self.game_lock(event.game_id).await;
        let _guard = game_lock.lock().await;

        self.delete_locked(event).await
    }

    /// Stores a new event built from `draft` and applies it.
    #[instrument(skip(self, draft), fields(kind = %draft.kind))]
    pub async fn record_event(
        &self,
        game_id: GameId,
        draft: EventFields,
    ) -> Result<GameEvent, StatsError> {
        let game_lock = self.game_lock(game_id).await;
        let _guard = game_lock.lock().await;

        let (id, sequence) = self.repository.next_event_identity().await?;
        self.create_locked(GameEvent::new(id, game_id, sequence, draft))
            .await
    }

    /// Applies a partial edit to a stored event. The stored version is read
    /// under the game lock so no concurrent edit can slip in between.
    #[instrument(skip(self, patch))]
    pub async fn edit_event(
        &self,
        game_id: GameId,
        event_id: EventId,
        patch: &EventPatch,
    ) -> Result<GameEvent, StatsError> {
        let game_lock = self.game_lock(game_id).await;
        let _guard = game_lock.lock().await;

        let old = self.require_event(game_id, event_id).await?;
        let new = old.with_fields(patch.apply_to(&old.fields));
        self.update_locked(&old, new).await
    }

    #[instrument(skip(self))]
    pub async fn remove_event(
        &self,
        game_id: GameId,
        event_id: EventId,
    ) -> Result<GameEvent, StatsError> {
        let game_lock = self.game_lock(game_id).await;
        let _guard = game_lock.lock().await;

        let event = self.require_event(game_id, event_id).await?;
        self.delete_locked(&event).await?;
        Ok(event)
    }

    // Rebuild

    /// Recomputes a game's aggregates from its live events and swaps them in.
    /// Safe to re-run: the old rows stay until the new table is written whole.
    #[instrument(skip(self))]
    pub async fn rebuild(&self, game_id: GameId) -> Result<GameAggregates, StatsError> {
        let game_lock = self.game_lock(game_id).await;
        let _guard = game_lock.lock().await;

        self.require_game(game_id).await?;
        let GameSnapshot { events, aggregates } = self
            .repository
            .rebuild_aggregates(game_id, &|events: &[GameEvent]| {
                rebuild::replay(game_id, events)
            })
            .await?;

        info!(
            game_id,
            events = events.len(),
            players = aggregates.players.len(),
            "Game aggregates rebuilt"
        );
        Ok(aggregates)
    }

    /// Compares stored aggregates with a fresh replay without writing anything.
    #[instrument(skip(self))]
    pub async fn verify(&self, game_id: GameId) -> Result<ConsistencyReport, StatsError> {
        let game_lock = self.game_lock(game_id).await;
        let _guard = game_lock.lock().await;

        self.require_game(game_id).await?;
        let snapshot = self.repository.load_snapshot(game_id).await?;
        let rebuilt = rebuild::replay(game_id, &snapshot.events)?;

        let report = rebuild::compare(&snapshot.aggregates, &rebuilt, snapshot.events.len());
        if report.is_consistent() {
            debug!(game_id, "Stored aggregates match replay");
        } else {
            warn!(
                game_id,
                mismatched = report.mismatched_rows.len(),
                "Stored aggregates drifted from event log"
            );
        }
        Ok(report)
    }

    // Box scores

    /// Player box scores of a game, or of one player in it
    pub async fn player_game_stats(
        &self,
        game_id: GameId,
        player_id: Option<PlayerId>,
    ) -> Result<Vec<PlayerGameLine>, StatsError> {
        self.require_game(game_id).await?;
        let table = self.repository.load_aggregates(game_id).await?;

        Ok(table
            .player_rows()
            .filter(|row| !row.is_empty())
            .filter(|row| player_id.map_or(true, |id| row.player_id == id))
            .map(|row| self.player_line(row, table.teams.get(&row.team_id)))
            .collect())
    }

    /// Team box scores of a game, or of one team in it
    pub async fn team_game_stats(
        &self,
        game_id: GameId,
        team_id: Option<&str>,
    ) -> Result<Vec<TeamGameLine>, StatsError> {
        let game = self.require_game(game_id).await?;
        let table = self.repository.load_aggregates(game_id).await?;

        Ok(table
            .team_rows()
            .filter(|row| !row.is_empty())
            .filter(|row| team_id.map_or(true, |id| row.team_id == id))
            .map(|row| {
                let opponent = game
                    .opponent_of(&row.team_id)
                    .and_then(|opponent| table.teams.get(opponent));
                self.team_line(row, opponent)
            })
            .collect())
    }

    /// One player's per-game box scores across games, optionally narrowed to one game
    pub async fn player_stats(
        &self,
        player_id: PlayerId,
        game_id: Option<GameId>,
    ) -> Result<Vec<PlayerGameLine>, StatsError> {
        let rows: Vec<PlayerGameAggregate> = self
            .repository
            .player_rows(player_id)
            .await?
            .into_iter()
            .filter(|row| !row.is_empty())
            .filter(|row| game_id.map_or(true, |id| row.game_id == id))
            .collect();

        let game_ids: Vec<GameId> = rows.iter().map(|row| row.game_id).collect();
        let team_rows = self.repository.team_rows_for_games(&game_ids).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let team_row = team_rows
                    .iter()
                    .find(|team| team.game_id == row.game_id && team.team_id == row.team_id);
                self.player_line(row, team_row)
            })
            .collect())
    }

    pub async fn shot_chart(
        &self,
        game_id: GameId,
        filter: &ShotFilter,
    ) -> Result<ShotChart, StatsError> {
        self.require_game(game_id).await?;
        let events = self.repository.list_events(game_id).await?;
        Ok(shot_chart::build(&events, filter))
    }

    // Season

    #[instrument(skip(self))]
    pub async fn player_season_stats(
        &self,
        player_id: PlayerId,
    ) -> Result<PlayerSeasonLine, StatsError> {
        let rows: Vec<PlayerGameAggregate> = self
            .repository
            .player_rows(player_id)
            .await?
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect();
        let game_ids: Vec<GameId> = rows.iter().map(|row| row.game_id).collect();
        let team_rows = self.repository.team_rows_for_games(&game_ids).await?;

        season::player_season(player_id, &rows, &team_rows, &self.rating_weights)
    }

    #[instrument(skip(self))]
    pub async fn team_season_stats(&self, team_id: &str) -> Result<TeamSeasonLine, StatsError> {
        let rows: Vec<TeamGameAggregate> = self
            .repository
            .team_rows(team_id)
            .await?
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect();
        let game_ids: Vec<GameId> = rows.iter().map(|row| row.game_id).collect();

        let opponent_rows: Vec<TeamGameAggregate> = self
            .repository
            .team_rows_for_games(&game_ids)
            .await?
            .into_iter()
            .filter(|row| row.team_id != team_id && !row.is_empty())
            .collect();

        let outcomes = try_join_all(
            game_ids
                .iter()
                .map(|game_id| self.game_result(*game_id, team_id)),
        )
        .await?;
        let results: BTreeMap<GameId, GameResult> = game_ids
            .iter()
            .copied()
            .zip(outcomes)
            .filter_map(|(game_id, outcome)| outcome.map(|result| (game_id, result)))
            .collect();

        season::team_season(
            team_id,
            &rows,
            &opponent_rows,
            &results,
            &self.possession_model,
        )
    }

    // Event views

    /// Every live event of a game in game-clock order
    pub async fn timeline(&self, game_id: GameId) -> Result<Vec<GameEvent>, StatsError> {
        self.events(game_id, &EventFilter::default()).await
    }

    pub async fn events(
        &self,
        game_id: GameId,
        filter: &EventFilter,
    ) -> Result<Vec<GameEvent>, StatsError> {
        self.require_game(game_id).await?;
        let mut events: Vec<GameEvent> = self
            .repository
            .list_events(game_id)
            .await?
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect();
        sort_chronologically(&mut events);
        Ok(events)
    }

    /// Events linked to footage with at least `min_confidence`
    pub async fn highlights(
        &self,
        game_id: GameId,
        min_confidence: f64,
    ) -> Result<Vec<GameEvent>, StatsError> {
        let mut events = self.events(game_id, &EventFilter::default()).await?;
        events.retain(|event| is_highlight(event, min_confidence));
        Ok(events)
    }

    /// A player's linked events across games, ordered by game then game clock
    pub async fn player_highlights(
        &self,
        player_id: PlayerId,
        min_confidence: f64,
    ) -> Result<Vec<GameEvent>, StatsError> {
        let mut events: Vec<GameEvent> = self
            .repository
            .list_player_events(player_id)
            .await?
            .into_iter()
            .filter(|event| is_highlight(event, min_confidence))
            .collect();
        events.sort_by(|a, b| a.game_id.cmp(&b.game_id).then_with(|| a.chronological_cmp(b)));
        Ok(events)
    }

    pub async fn court_time(&self, game_id: GameId) -> Result<Vec<CourtTime>, StatsError> {
        let game = self.require_game(game_id).await?;
        let events = self.repository.list_events(game_id).await?;
        Ok(court_time::replay(&game, &events))
    }

    /// Timeouts called by each side of the game
    pub async fn timeouts(&self, game_id: GameId) -> Result<Vec<TeamTimeouts>, StatsError> {
        let game = self.require_game(game_id).await?;
        let events = self.repository.list_events(game_id).await?;
        Ok(court_time::count_timeouts(&game, &events))
    }

    // Locked write paths. Callers hold the game's lock.

    async fn create_locked(&self, event: GameEvent) -> Result<GameEvent, StatsError> {
        let game = self.require_game(event.game_id).await?;
        self.check_membership(&game, &event.fields).await?;

        self.repository
            .commit(
                event.game_id,
                EventWrite::Insert(event.clone()),
                &|table: &mut GameAggregates| table.on_create(&event),
            )
            .await?;

        info!(game_id = event.game_id, event_id = event.id, kind = %event.fields.kind, "Event applied");
        Ok(event)
    }

    async fn update_locked(&self, old: &GameEvent, new: GameEvent) -> Result<GameEvent, StatsError> {
        let game = self.require_game(old.game_id).await?;
        self.check_membership(&game, &new.fields).await?;

        let write = EventWrite::Update {
            previous: old.clone(),
            next: new.clone(),
        };
        self.repository
            .commit(old.game_id, write, &|table: &mut GameAggregates| {
                table.on_update(old, &new)
            })
            .await?;

        info!(game_id = new.game_id, event_id = new.id, kind = %new.fields.kind, "Event update applied");
        Ok(new)
    }

    async fn delete_locked(&self, event: &GameEvent) -> Result<(), StatsError> {
        self.require_game(event.game_id).await?;

        self.repository
            .commit(
                event.game_id,
                EventWrite::Delete(event.clone()),
                &|table: &mut GameAggregates| table.on_delete(event),
            )
            .await?;

        info!(game_id = event.game_id, event_id = event.id, "Event removal applied");
        Ok(())
    }

    // Helpers

    fn player_line(
        &self,
        row: &PlayerGameAggregate,
        team_row: Option<&TeamGameAggregate>,
    ) -> PlayerGameLine {
        PlayerGameLine {
            rebounds_total: row.stats.rebounds_total(),
            shooting: ShootingSplits::from_stats(&row.stats),
            composite_rating: team_row
                .and_then(|team| self.rating_weights.composite(&row.stats, &team.stats)),
            row: row.clone(),
        }
    }

    fn team_line(
        &self,
        row: &TeamGameAggregate,
        opponent: Option<&TeamGameAggregate>,
    ) -> TeamGameLine {
        TeamGameLine {
            rebounds_total: row.stats.rebounds_total(),
            shooting: ShootingSplits::from_stats(&row.stats),
            ratings: self.possession_model.ratings(
                &row.stats,
                opponent.map(|opponent| opponent.stats.points),
                1,
            ),
            row: row.clone(),
        }
    }

    async fn game_result(
        &self,
        game_id: GameId,
        team_id: &str,
    ) -> Result<Option<GameResult>, StatsError> {
        let game = self.require_game(game_id).await?;
        let events = self.repository.list_events(game_id).await?;
        Ok(final_score(&events).and_then(|score| GameResult::for_team(&game, team_id, score)))
    }

    async fn require_game(&self, game_id: GameId) -> Result<Game, StatsError> {
        self.games
            .get_game(game_id)
            .await?
            .ok_or(StatsError::GameNotFound(game_id))
    }

    async fn require_event(&self, game_id: GameId, event_id: EventId) -> Result<GameEvent, StatsError> {
        self.repository
            .get_event(game_id, event_id)
            .await?
            .ok_or(StatsError::EventNotFound(event_id))
    }

    /// The event's team must play in the game and its primary player must be
    /// registered with that team. A second player only has to be registered
    /// with one of the two teams.
    async fn check_membership(&self, game: &Game, fields: &EventFields) -> Result<(), StatsError> {
        if !game.has_team(&fields.team_id) {
            return Err(StatsError::MissingMembership(format!(
                "team {} does not play in game {}",
                fields.team_id, game.id
            )));
        }

        if let Some(player_id) = fields.player_id {
            let player = self.games.get_player(player_id).await?;
            match player {
                Some(player) if player.team_id == fields.team_id => {}
                Some(player) => {
                    return Err(StatsError::MissingMembership(format!(
                        "player {} plays for {}, not {}",
                        player_id, player.team_id, fields.team_id
                    )));
                }
                None => {
                    return Err(StatsError::MissingMembership(format!(
                        "player {} is not registered",
                        player_id
                    )));
                }
            }
        }

        if let Some(player_id) = fields.second_player_id {
            let registered = self.games.get_player(player_id).await?;
            if !registered.is_some_and(|player| game.has_team(&player.team_id)) {
                return Err(StatsError::MissingMembership(format!(
                    "player {} is not on a team in game {}",
                    player_id, game.id
                )));
            }
        }
        Ok(())
    }

    async fn game_lock(&self, game_id: GameId) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.game_mutexes.read().await;
            if let Some(lock) = guard.get(&game_id) {
                return lock.clone();
            }
        }

        let mut guard = self.game_mutexes.write().await;
        guard
            .entry(game_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the locks of games nobody is writing to. A lock still held or
    /// waited on has another owner besides the map and is kept.
    pub async fn prune_idle_locks(&self) -> usize {
        let mut guard = self.game_mutexes.write().await;
        let before = guard.len();
        guard.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - guard.len()
    }

    pub async fn lock_count(&self) -> usize {
        self.game_mutexes.read().await.len()
    }
}

/// Periodically drops per-game locks left behind by finished writes
#[instrument(skip(service))]
pub async fn start_lock_cleanup_task(service: Arc<StatsService>, every: Duration) {
    info!(
        cleanup_interval_secs = every.as_secs(),
        "Starting game lock cleanup background task"
    );

    let mut cleanup_interval = interval(every);
    loop {
        cleanup_interval.tick().await;

        let pruned = service.prune_idle_locks().await;
        if pruned > 0 {
            debug!(pruned, "Idle game locks dropped");
        }
    }
}

fn is_highlight(event: &GameEvent, min_confidence: f64) -> bool {
    event.fields.has_video_link() && event.fields.confidence >= min_confidence
}

pub struct StatsServiceBuilder {
    repository: Arc<dyn StatsRepository>,
    games: Arc<dyn GameRepository>,
    possession_model: PossessionModel,
    rating_weights: RatingWeights,
}

impl StatsServiceBuilder {
    fn new(repository: Arc<dyn StatsRepository>, games: Arc<dyn GameRepository>) -> Self {
        Self {
            repository,
            games,
            possession_model: PossessionModel::default(),
            rating_weights: RatingWeights::default(),
        }
    }

    pub fn with_possession_model(mut self, possession_model: PossessionModel) -> Self {
        self.possession_model = possession_model;
        self
    }

    pub fn with_rating_weights(mut self, rating_weights: RatingWeights) -> Self {
        self.rating_weights = rating_weights;
        self
    }

    pub fn build(self) -> StatsService {
        StatsService {
            repository: self.repository,
            games: self.games,
            possession_model: self.possession_model,
            rating_weights: self.rating_weights,
            game_mutexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
