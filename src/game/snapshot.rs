//! Match snapshot wire shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::{Board, BoardError};
use super::r#match::{GameMatch, MatchResult, MatchStatus, Player};

/// Public view of a seat. Heartbeat timestamps stay internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub username: String,
    pub session_token: String,
    pub is_bot: bool,
    pub connected: bool,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            username: p.username.clone(),
            session_token: p.session_token.clone(),
            is_bot: p.is_bot,
            connected: p.connected,
        }
    }
}

/// Full match state broadcast as `match_update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub id: Uuid,
    pub player1: PlayerView,
    pub player2: Option<PlayerView>,
    /// 6 rows of 7 cells, row 0 on top
    pub board: Vec<Vec<u8>>,
    pub current_turn: u8,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub winner: Option<PlayerView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<MatchResult>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub last_move_at: DateTime<Utc>,
    pub turn_started_at: DateTime<Utc>,
    pub turn_timeout_sec: u64,
}

impl MatchSnapshot {
    pub fn from_match(game: &GameMatch) -> Self {
        Self {
            id: game.id,
            player1: PlayerView::from(&game.player1),
            player2: game.player2.as_ref().map(PlayerView::from),
            board: game.board.to_rows(),
            current_turn: game.current_turn.as_u8(),
            status: game.status,
            winner: game.winner_player().map(PlayerView::from),
            result: game.result,
            created_at: game.created_at,
            started_at: game.started_at,
            finished_at: game.finished_at,
            last_move_at: game.last_move_at,
            turn_started_at: game.turn_started_at,
            turn_timeout_sec: game.turn_timeout.as_secs(),
        }
    }

    /// Rebuild the grid carried by this snapshot
    pub fn board(&self) -> Result<Board, BoardError> {
        Board::from_rows(&self.board)
    }
}
