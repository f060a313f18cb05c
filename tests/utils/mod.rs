pub mod assertions;
pub mod event_builders;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{assert_consistent, assert_player_rows_sum_to_team_rows};
pub use event_builders::EventBuilder;
#[allow(unused_imports)]
pub use mocks::FailingCommitRepository;
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder, AWAY, AWAY_PLAYERS, GAME_ID, HOME, HOME_PLAYERS};
