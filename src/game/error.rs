//! Gameplay errors returned to the transport layer

use super::board::BoardError;

/// Errors surfaced to the originating connection as an `error` message.
/// None of them end the match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("match not found")]
    NotFound,

    #[error("invalid player")]
    InvalidPlayer,

    #[error("not your turn")]
    NotYourTurn,

    #[error("match not in progress")]
    NotInProgress,

    #[error("invalid column")]
    InvalidColumn,

    #[error("column is full")]
    ColumnFull,

    #[error("session not found")]
    SessionNotFound,

    #[error("reconnect window expired")]
    ReconnectWindowExpired,

    #[error("no legal move available")]
    NoLegalMove,

    /// The second seat was already taken
    #[error("match already has two players")]
    MatchFull,

    #[error("bot is not on turn")]
    NotBotTurn,

    #[error("bot search failed")]
    SearchFailed,
}

impl From<BoardError> for GameError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::InvalidColumn | BoardError::InvalidShape(_) => GameError::InvalidColumn,
            BoardError::ColumnFull => GameError::ColumnFull,
        }
    }
}
