pub mod court_time;
pub mod delta;
pub mod derived;
pub mod rebuild;
pub mod repository;
pub mod season;
pub mod service;
pub mod shot_chart;

mod errors;
pub mod models;
mod updater;

pub use court_time::{CourtTime, TeamTimeouts};
pub use delta::{classify, Delta};
pub use derived::{PossessionModel, RatingWeights, ShootingSplits, TeamRatings};
pub use errors::StatsError;
pub use models::*;
pub use rebuild::{ConsistencyReport, RowKey};
pub use repository::{
    AggregateReplay, AggregateUpdate, EventWrite, GameSnapshot, InMemoryStatsRepository,
    PostgresStatsRepository, StatsRepository,
};
pub use season::GameResult;
pub use service::{start_lock_cleanup_task, StatsService, StatsServiceBuilder};
pub use shot_chart::{ShotChart, ShotFilter, ShotPoint};
