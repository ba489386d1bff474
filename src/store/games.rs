//! Finished-match persistence

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::GameMatch;

use super::supabase::{StoreError, SupabaseClient};

/// Row written once per finished or abandoned match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecord {
    pub id: Uuid,
    pub player1: String,
    pub player2: String,
    pub winner: Option<String>,
    pub result: String,
    pub board_state: Vec<Vec<u8>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameRecord {
    pub fn from_match(game: &GameMatch) -> Self {
        Self {
            id: game.id,
            player1: game.player1.username.clone(),
            player2: game
                .player2
                .as_ref()
                .map(|p| p.username.clone())
                .unwrap_or_default(),
            winner: game.winner_player().map(|p| p.username.clone()),
            result: game.result.map(|r| r.as_str()).unwrap_or_default().to_string(),
            board_state: game.board.to_rows(),
            started_at: game.started_at,
            finished_at: game.finished_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserRow<'a> {
    username: &'a str,
    is_bot: bool,
}

/// Storage collaborator for match outcomes. `save_game` is an upsert on id.
pub trait GameStore: Send + Sync {
    fn upsert_user<'a>(&'a self, username: &'a str, is_bot: bool) -> BoxFuture<'a, Result<(), StoreError>>;

    fn save_game<'a>(&'a self, record: &'a GameRecord) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Supabase-backed store (`users` and `games` tables)
#[derive(Clone)]
pub struct SupabaseGameStore {
    client: SupabaseClient,
}

impl SupabaseGameStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

impl GameStore for SupabaseGameStore {
    fn upsert_user<'a>(&'a self, username: &'a str, is_bot: bool) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            let row = UserRow { username, is_bot };
            self.client.upsert("users", &row, "username").await
        }
        .boxed()
    }

    fn save_game<'a>(&'a self, record: &'a GameRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        async move { self.client.upsert("games", record, "id").await }.boxed()
    }
}

/// Used when no database is configured
#[derive(Clone, Default)]
pub struct DisabledGameStore;

impl GameStore for DisabledGameStore {
    fn upsert_user<'a>(&'a self, username: &'a str, _is_bot: bool) -> BoxFuture<'a, Result<(), StoreError>> {
        debug!(username, "Persistence disabled, skipping user upsert");
        futures::future::ready(Ok(())).boxed()
    }

    fn save_game<'a>(&'a self, record: &'a GameRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        info!(match_id = %record.id, result = %record.result, "Persistence disabled, match not saved");
        futures::future::ready(Ok(())).boxed()
    }
}

/// Upsert both players, then the match row
pub async fn persist_match(store: &dyn GameStore, game: &GameMatch) -> Result<(), StoreError> {
    store.upsert_user(&game.player1.username, game.player1.is_bot).await?;
    if let Some(p2) = &game.player2 {
        store.upsert_user(&p2.username, p2.is_bot).await?;
    }
    store.save_game(&GameRecord::from_match(game)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;
    use std::time::Duration;

    #[test]
    fn record_captures_outcome_by_username() {
        let now = Utc::now();
        let mut game = GameMatch::new(Player::human("alice", now), Duration::from_secs(30), now);
        game.add_second_player(Player::bot(now), now).unwrap();
        let p2 = game.player2.as_ref().unwrap().id;
        game.abandon(p2, now);

        let record = GameRecord::from_match(&game);
        assert_eq!(record.player1, "alice");
        assert_eq!(record.player2, "Bot");
        assert_eq!(record.winner.as_deref(), Some("alice"));
        assert_eq!(record.result, "player1_win");
        assert_eq!(record.board_state.len(), 6);
        assert!(record.finished_at.is_some());
    }

    #[tokio::test]
    async fn disabled_store_accepts_everything() {
        let now = Utc::now();
        let game = GameMatch::new(Player::human("alice", now), Duration::from_secs(30), now);
        tokio_test::assert_ok!(persist_match(&DisabledGameStore, &game).await);
    }
}
