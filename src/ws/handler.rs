//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameError, MatchSnapshot, MatchStatus};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::hub::OUTBOUND_QUEUE;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Failures reported back to the sender as an `error` message
#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("Username is required")]
    MissingUsername,

    #[error("Session token is required")]
    MissingToken,

    #[error("Not in a match")]
    NotInMatch,

    #[error("Already in a match")]
    AlreadyInMatch,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMsg>(OUTBOUND_QUEUE);
    let conn_id = state.hub.register(tx);

    info!(conn_id = %conn_id, "New WebSocket connection");

    // Writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> registry / matchmaker
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                let outcome = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_message(&state, conn_id, msg).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        state.hub.send(conn_id, ServerMsg::error("Invalid message format"));
                        continue;
                    }
                };

                if let Err(e) = outcome {
                    debug!(conn_id = %conn_id, error = %e, "Request rejected");
                    state.hub.send(conn_id, ServerMsg::error(e));
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    handle_disconnect(&state, conn_id).await;
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

async fn handle_message(state: &AppState, conn_id: Uuid, msg: ClientMsg) -> Result<(), RequestError> {
    match msg {
        ClientMsg::Join { username } => handle_join(state, conn_id, username.trim()).await,
        ClientMsg::Move { column } => {
            let (player_id, match_id) = state.hub.seat(conn_id).ok_or(RequestError::NotInMatch)?;
            let column = usize::try_from(column).map_err(|_| GameError::InvalidColumn)?;
            state.registry.make_move(match_id, player_id, column)?;
            Ok(())
        }
        ClientMsg::Reconnect { session_token } => {
            let token = session_token.trim();
            if token.is_empty() {
                return Err(RequestError::MissingToken);
            }

            let (shared, player) = state.registry.reconnect_by_session(token)?;
            let snapshot = MatchSnapshot::from_match(&shared.read());

            let previous = state.hub.seat(conn_id);
            state.hub.address(conn_id, player.id, snapshot.id);
            if let Some((old_player, old_match)) = previous.filter(|(id, _)| *id != player.id) {
                release_seat(state, old_player, old_match).await;
            }

            state.hub.send(conn_id, ServerMsg::reconnected(&player, snapshot.id));
            state.hub.send(conn_id, ServerMsg::MatchUpdate(snapshot));
            Ok(())
        }
        ClientMsg::Heartbeat {} => {
            // Heartbeats before joining are ignored
            let Some((player_id, match_id)) = state.hub.seat(conn_id) else {
                return Ok(());
            };
            if let Err(e) = state.registry.heartbeat(player_id) {
                debug!(conn_id = %conn_id, error = %e, "Heartbeat for a match no longer tracked");
                return Ok(());
            }
            if let Ok(snapshot) = state.registry.snapshot(match_id) {
                state.hub.send(conn_id, ServerMsg::MatchUpdate(snapshot));
            }
            Ok(())
        }
    }
}

async fn handle_join(state: &AppState, conn_id: Uuid, username: &str) -> Result<(), RequestError> {
    if username.is_empty() {
        return Err(RequestError::MissingUsername);
    }

    if let Some((_, match_id)) = state.hub.seat(conn_id) {
        let active = state
            .registry
            .get(match_id)
            .is_ok_and(|shared| !shared.read().status.is_terminal());
        if active {
            return Err(RequestError::AlreadyInMatch);
        }
    }

    let (player, shared) = state.matchmaker.add_player(username).await;
    let snapshot = MatchSnapshot::from_match(&shared.read());
    let match_id = snapshot.id;

    state.hub.address(conn_id, player.id, match_id);
    info!(conn_id = %conn_id, player_id = %player.id, match_id = %match_id, "Client joined");

    state.hub.send(conn_id, ServerMsg::player_info(&player, match_id));
    if snapshot.status == MatchStatus::Waiting {
        state.hub.send(
            conn_id,
            ServerMsg::Waiting {
                message: "Waiting for opponent...".to_string(),
            },
        );
    }
    state.hub.send(conn_id, ServerMsg::MatchUpdate(snapshot));
    Ok(())
}

/// Release the connection's seat: leave the queue, or mark the player disconnected
async fn handle_disconnect(state: &AppState, conn_id: Uuid) {
    let Some((player_id, match_id)) = state.hub.unregister(conn_id) else {
        return;
    };
    release_seat(state, player_id, match_id).await;
}

/// Give up a seat no longer addressed by this connection
async fn release_seat(state: &AppState, player_id: Uuid, match_id: Uuid) {
    // A newer connection may already have resumed this seat
    if state.hub.is_player_connected(player_id) {
        debug!(player_id = %player_id, "Seat held by another connection");
        return;
    }

    if state.matchmaker.remove_player(player_id).await {
        return;
    }

    state.registry.set_disconnected(player_id);
    debug!(player_id = %player_id, match_id = %match_id, "Seat released");
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
