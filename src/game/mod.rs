//! Game rules, engine, and match lifecycle

pub mod board;
pub mod bot;
pub mod error;
pub mod r#match;
pub mod registry;
pub mod snapshot;

#[cfg(test)]
pub mod testing;

pub use board::Side;
pub use error::GameError;
pub use r#match::{GameMatch, MatchResult, MatchStatus, Player, SharedMatch};
pub use registry::{MatchNotice, MatchRegistry, RegistryStats};
pub use snapshot::MatchSnapshot;
