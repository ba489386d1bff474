//! WebSocket protocol message definitions
//! Every frame is `{"type": "...", "payload": {...}}`

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{MatchSnapshot, Player};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter matchmaking under a display name
    Join { username: String },

    /// Drop a disc. Signed so out-of-range input reaches validation instead of failing to parse.
    Move { column: i64 },

    /// Resume a seat after a dropped connection
    Reconnect { session_token: String },

    /// Liveness signal, sent with an empty payload
    Heartbeat {},
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Seat assignment after a join; the token is needed to reconnect
    PlayerInfo {
        player_id: Uuid,
        match_id: Uuid,
        username: String,
        session_token: String,
    },

    Waiting {
        message: String,
    },

    /// Full match state, sent after every change
    MatchUpdate(MatchSnapshot),

    Reconnected {
        match_id: Uuid,
        player_id: Uuid,
        username: String,
        session_token: String,
    },

    Error {
        message: String,
    },
}

impl ServerMsg {
    pub fn player_info(player: &Player, match_id: Uuid) -> Self {
        ServerMsg::PlayerInfo {
            player_id: player.id,
            match_id,
            username: player.username.clone(),
            session_token: player.session_token.clone(),
        }
    }

    pub fn reconnected(player: &Player, match_id: Uuid) -> Self {
        ServerMsg::Reconnected {
            match_id,
            player_id: player.id,
            username: player.username.clone(),
            session_token: player.session_token.clone(),
        }
    }

    pub fn error(message: impl ToString) -> Self {
        ServerMsg::Error {
            message: message.to_string(),
        }
    }
}
