use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtstats::{
    game::{GameRepository, PostgresGameRepository},
    shared::{GameId, PlayerId},
    stats::PostgresStatsRepository,
    AdminConfig, StatsService,
};

#[derive(Parser)]
#[command(name = "courtstats-admin")]
#[command(about = "Rebuild, verify and report basketball game aggregates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild one game's aggregates from its event log
    Rebuild {
        #[arg(long)]
        game_id: GameId,
    },

    /// Rebuild every registered game
    RebuildAll,

    /// Compare stored aggregates with a replay, without writing
    Verify {
        #[arg(long)]
        game_id: GameId,
    },

    /// Print player and team box scores of a game
    BoxScore {
        #[arg(long)]
        game_id: GameId,
    },

    /// Print a player's season line
    PlayerSeason {
        #[arg(long)]
        player_id: PlayerId,
    },

    /// Print a team's season line
    TeamSeason {
        #[arg(long)]
        team_id: String,
    },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courtstats=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AdminConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let games = Arc::new(PostgresGameRepository::new(pool.clone()));
    let service = StatsService::builder(Arc::new(PostgresStatsRepository::new(pool)), games.clone())
        .with_possession_model(config.possession_model)
        .build();

    match cli.command {
        Commands::Rebuild { game_id } => {
            let rebuilt = service.rebuild(game_id).await?;
            info!(
                game_id,
                players = rebuilt.players.len(),
                teams = rebuilt.teams.len(),
                "Rebuild finished"
            );
        }

        Commands::RebuildAll => {
            let all_games = games.list_games().await?;
            let outcomes = join_all(all_games.iter().map(|game| service.rebuild(game.id))).await;
            service.prune_idle_locks().await;

            let mut failures = 0;
            for (game, outcome) in all_games.iter().zip(outcomes) {
                if let Err(err) = outcome {
                    failures += 1;
                    error!(game_id = game.id, %err, "Rebuild failed");
                }
            }
            info!(games = all_games.len(), failures, "Rebuild of all games finished");
            if failures > 0 {
                anyhow::bail!("{} of {} games failed to rebuild", failures, all_games.len());
            }
        }

        Commands::Verify { game_id } => {
            let report = service.verify(game_id).await?;
            print_json(&report)?;
            if !report.is_consistent() {
                anyhow::bail!(
                    "game {} has {} drifted rows",
                    game_id,
                    report.mismatched_rows.len()
                );
            }
        }

        Commands::BoxScore { game_id } => {
            let teams = service.team_game_stats(game_id, None).await?;
            let players = service.player_game_stats(game_id, None).await?;
            let timeouts = service.timeouts(game_id).await?;
            print_json(&serde_json::json!({
                "teams": teams,
                "players": players,
                "timeouts": timeouts,
            }))?;
        }

        Commands::PlayerSeason { player_id } => {
            print_json(&service.player_season_stats(player_id).await?)?;
        }

        Commands::TeamSeason { team_id } => {
            print_json(&service.team_season_stats(&team_id).await?)?;
        }
    }

    Ok(())
}
