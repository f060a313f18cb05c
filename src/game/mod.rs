// Game and player registration
//
// Membership is maintained outside the stats engine; this module is the seam
// the engine reads it through.

// Public API
pub use models::{Game, Player};
pub use repository::{GameRepository, InMemoryGameRepository, PostgresGameRepository};

// Internal modules
pub mod models;
pub mod repository;
