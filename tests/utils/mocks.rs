use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use courtstats::{
    event::GameEvent,
    shared::{EventId, GameId, PlayerId},
    stats::{
        AggregateReplay, AggregateUpdate, EventWrite, GameAggregates, GameSnapshot,
        InMemoryStatsRepository, PlayerGameAggregate, StatsError, StatsRepository,
        TeamGameAggregate,
    },
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// In-memory repository whose commits can be made to fail on demand
#[derive(Default)]
pub struct FailingCommitRepository {
    inner: InMemoryStatsRepository,
    fail_commits: AtomicBool,
}

impl FailingCommitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatsRepository for FailingCommitRepository {
    async fn next_event_identity(&self) -> Result<(EventId, i64), StatsError> {
        self.inner.next_event_identity().await
    }

    async fn get_event(
        &self,
        game_id: GameId,
        event_id: EventId,
    ) -> Result<Option<GameEvent>, StatsError> {
        self.inner.get_event(game_id, event_id).await
    }

    async fn list_events(&self, game_id: GameId) -> Result<Vec<GameEvent>, StatsError> {
        self.inner.list_events(game_id).await
    }

    async fn list_player_events(&self, player_id: PlayerId) -> Result<Vec<GameEvent>, StatsError> {
        self.inner.list_player_events(player_id).await
    }

    async fn load_aggregates(&self, game_id: GameId) -> Result<GameAggregates, StatsError> {
        self.inner.load_aggregates(game_id).await
    }

    async fn load_snapshot(&self, game_id: GameId) -> Result<GameSnapshot, StatsError> {
        self.inner.load_snapshot(game_id).await
    }

    async fn commit(
        &self,
        game_id: GameId,
        write: EventWrite,
        update: &AggregateUpdate<'_>,
    ) -> Result<(), StatsError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StatsError::Repository("connection reset".to_string()));
        }
        self.inner.commit(game_id, write, update).await
    }

    async fn rebuild_aggregates(
        &self,
        game_id: GameId,
        replay: &AggregateReplay<'_>,
    ) -> Result<GameSnapshot, StatsError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StatsError::Repository("connection reset".to_string()));
        }
        self.inner.rebuild_aggregates(game_id, replay).await
    }

    async fn player_rows(&self, player_id: PlayerId) -> Result<Vec<PlayerGameAggregate>, StatsError> {
        self.inner.player_rows(player_id).await
    }

    async fn team_rows(&self, team_id: &str) -> Result<Vec<TeamGameAggregate>, StatsError> {
        self.inner.team_rows(team_id).await
    }

    async fn team_rows_for_games(
        &self,
        game_ids: &[GameId],
    ) -> Result<Vec<TeamGameAggregate>, StatsError> {
        self.inner.team_rows_for_games(game_ids).await
    }
}
