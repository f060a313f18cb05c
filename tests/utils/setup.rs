#![allow(dead_code)]
use std::sync::Arc;

use courtstats::{
    game::{Game, GameRepository, InMemoryGameRepository, Player},
    shared::{GameId, PlayerId},
    stats::{InMemoryStatsRepository, StatsRepository, StatsService},
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const GAME_ID: GameId = 1;
pub const HOME: &str = "lakers";
pub const AWAY: &str = "celtics";

/// Lakers roster of the default setup
pub const HOME_PLAYERS: [PlayerId; 3] = [1, 2, 3];
/// Celtics roster of the default setup
pub const AWAY_PLAYERS: [PlayerId; 3] = [11, 12, 13];

pub struct TestSetup {
    pub service: Arc<StatsService>,
    pub stats_repository: Arc<dyn StatsRepository>,
    pub game_repository: Arc<InMemoryGameRepository>,
}

pub struct TestSetupBuilder {
    games: Vec<Game>,
    players: Vec<Player>,
    stats_repository: Option<Arc<dyn StatsRepository>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            games: vec![],
            players: vec![],
            stats_repository: None,
        }
    }

    /// Game 1, lakers at home against the celtics, three players a side
    pub fn with_default_game(self) -> Self {
        let mut builder = self.with_game(GAME_ID, HOME, AWAY);
        for id in HOME_PLAYERS {
            builder = builder.with_player(id, HOME);
        }
        for id in AWAY_PLAYERS {
            builder = builder.with_player(id, AWAY);
        }
        builder
    }

    pub fn with_game(mut self, game_id: GameId, home: &str, away: &str) -> Self {
        self.games.push(Game::new(
            game_id,
            &format!("{} vs {} #{}", home, away, game_id),
            home,
            away,
        ));
        self
    }

    pub fn with_player(mut self, player_id: PlayerId, team_id: &str) -> Self {
        self.players
            .push(Player::new(player_id, &format!("Player {}", player_id), team_id));
        self
    }

    /// Swaps the in-memory stats repository for another implementation
    pub fn with_stats_repository(mut self, repository: Arc<dyn StatsRepository>) -> Self {
        self.stats_repository = Some(repository);
        self
    }

    pub async fn build(self) -> TestSetup {
        let game_repository = Arc::new(InMemoryGameRepository::new());
        for game in &self.games {
            game_repository.create_game(game).await.unwrap();
        }
        for player in &self.players {
            game_repository.create_player(player).await.unwrap();
        }

        let stats_repository = self
            .stats_repository
            .unwrap_or_else(|| Arc::new(InMemoryStatsRepository::new()));
        let service = StatsService::builder(stats_repository.clone(), game_repository.clone()).build();

        TestSetup {
            service: Arc::new(service),
            stats_repository,
            game_repository,
        }
    }
}
