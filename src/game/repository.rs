use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{Game, Player};
use crate::shared::{GameId, PlayerId};
use crate::stats::StatsError;

/// Registration of games and players.
///
/// The stats engine only reads from it to check membership; registration
/// itself belongs to the surrounding application.
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn create_game(&self, game: &Game) -> Result<(), StatsError>;
    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>, StatsError>;
    async fn list_games(&self) -> Result<Vec<Game>, StatsError>;
    async fn create_player(&self, player: &Player) -> Result<(), StatsError>;
    async fn get_player(&self, player_id: PlayerId) -> Result<Option<Player>, StatsError>;
}

/// In-memory implementation of GameRepository for development and testing
#[derive(Debug, Default)]
pub struct InMemoryGameRepository {
    games: Arc<RwLock<HashMap<GameId, Game>>>,
    players: Arc<RwLock<HashMap<PlayerId, Player>>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    #[instrument(skip(self, game), fields(game_id = game.id))]
    async fn create_game(&self, game: &Game) -> Result<(), StatsError> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.id) {
            warn!(game_id = game.id, "Game already registered");
            return Err(StatsError::Repository(format!(
                "game {} already exists",
                game.id
            )));
        }
        games.insert(game.id, game.clone());
        debug!(game_id = game.id, "Game registered in memory");
        Ok(())
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>, StatsError> {
        Ok(self.games.read().await.get(&game_id).cloned())
    }

    async fn list_games(&self) -> Result<Vec<Game>, StatsError> {
        let mut games: Vec<Game> = self.games.read().await.values().cloned().collect();
        games.sort_by_key(|game| game.id);
        Ok(games)
    }

    #[instrument(skip(self, player), fields(player_id = player.id))]
    async fn create_player(&self, player: &Player) -> Result<(), StatsError> {
        let mut players = self.players.write().await;
        if players.contains_key(&player.id) {
            warn!(player_id = player.id, "Player already registered");
            return Err(StatsError::Repository(format!(
                "player {} already exists",
                player.id
            )));
        }
        players.insert(player.id, player.clone());
        debug!(player_id = player.id, team_id = %player.team_id, "Player registered in memory");
        Ok(())
    }

    async fn get_player(&self, player_id: PlayerId) -> Result<Option<Player>, StatsError> {
        Ok(self.players.read().await.get(&player_id).cloned())
    }
}

/// PostgreSQL implementation backed by the `games` and `players` tables
pub struct PostgresGameRepository {
    pool: PgPool,
}

impl PostgresGameRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: sqlx::Error) -> StatsError {
    warn!(error = %e, "Game registry query failed");
    StatsError::Repository(e.to_string())
}

#[async_trait]
impl GameRepository for PostgresGameRepository {
    #[instrument(skip(self, game), fields(game_id = game.id))]
    async fn create_game(&self, game: &Game) -> Result<(), StatsError> {
        sqlx::query(
            "INSERT INTO games (id, name, home_team_id, away_team_id, date) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(game.id)
        .bind(&game.name)
        .bind(&game.home_team_id)
        .bind(&game.away_team_id)
        .bind(game.date)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(game_id = game.id, "Game registered in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>, StatsError> {
        sqlx::query_as::<_, Game>(
            "SELECT id, name, home_team_id, away_team_id, date FROM games WHERE id = $1",
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self))]
    async fn list_games(&self) -> Result<Vec<Game>, StatsError> {
        sqlx::query_as::<_, Game>(
            "SELECT id, name, home_team_id, away_team_id, date FROM games ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self, player), fields(player_id = player.id))]
    async fn create_player(&self, player: &Player) -> Result<(), StatsError> {
        sqlx::query("INSERT INTO players (id, name, team_id, jersey_number) VALUES ($1, $2, $3, $4)")
            .bind(player.id)
            .bind(&player.name)
            .bind(&player.team_id)
            .bind(&player.jersey_number)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        debug!(player_id = player.id, "Player registered in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_player(&self, player_id: PlayerId) -> Result<Option<Player>, StatsError> {
        sqlx::query_as::<_, Player>(
            "SELECT id, name, team_id, jersey_number FROM players WHERE id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }
}
