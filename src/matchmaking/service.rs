//! Matchmaking service - pairs waiting players, falls back to a bot

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::{MatchRegistry, Player, SharedMatch};

use super::queue::{MatchmakingQueue, QueuedPlayer};

/// Matchmaking service
pub struct MatchmakingService {
    queue: Mutex<MatchmakingQueue>,
    registry: Arc<MatchRegistry>,
    /// Wait before a queued player is given a bot
    timeout: Duration,
    sweep: Duration,
}

impl MatchmakingService {
    pub fn new(registry: Arc<MatchRegistry>) -> Self {
        let timings = registry.timings();
        Self {
            queue: Mutex::new(MatchmakingQueue::new()),
            timeout: timings.matchmaking_timeout,
            sweep: timings.matchmaking_sweep,
            registry,
        }
    }

    /// Pair `username` with the oldest waiting player, or queue them behind a fresh match
    pub async fn add_player(&self, username: &str) -> (Player, SharedMatch) {
        let player = Player::human(username, Utc::now());
        let mut queue = self.queue.lock().await;

        while let Some(waiting) = queue.pop_front() {
            match self.registry.join_match(waiting.match_id, player.clone()) {
                Ok(shared) => {
                    info!(
                        match_id = %waiting.match_id,
                        player1 = %waiting.username,
                        player2 = %player.username,
                        "Matched players"
                    );
                    return (player, shared);
                }
                Err(e) => {
                    // Waiting match vanished since it was queued
                    warn!(
                        match_id = %waiting.match_id,
                        player = %waiting.username,
                        error = %e,
                        "Dropping stale matchmaking request"
                    );
                }
            }
        }

        let shared = self.registry.create_match(player.clone());
        let (match_id, queued_at) = {
            let game = shared.read();
            (game.id, game.created_at)
        };
        queue.enqueue(QueuedPlayer::new(&player, match_id, queued_at));

        info!(
            player = %player.username,
            match_id = %match_id,
            queue_size = queue.len(),
            "Player joined matchmaking queue"
        );
        (player, shared)
    }

    /// Drop a still-queued player and their waiting match. False if they were not queued.
    pub async fn remove_player(&self, player_id: Uuid) -> bool {
        let removed = self.queue.lock().await.dequeue(player_id);
        let Some(request) = removed else {
            return false;
        };

        self.registry.discard_waiting(player_id);
        info!(player = %request.username, "Player removed from matchmaking queue");
        true
    }

    /// Seat a bot opposite every request that has waited out the timeout
    pub async fn process_queue_at(&self, now: DateTime<Utc>) {
        let expired = self.queue.lock().await.drain_expired(now, self.timeout);

        for request in expired {
            match self.registry.join_match(request.match_id, Player::bot(now)) {
                Ok(_) => info!(
                    match_id = %request.match_id,
                    player = %request.username,
                    "Player matched with bot after timeout"
                ),
                Err(e) => warn!(
                    match_id = %request.match_id,
                    player = %request.username,
                    error = %e,
                    "Could not seat bot"
                ),
            }
        }
    }

    /// Run the matchmaking service (periodic queue processing)
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.sweep);

        loop {
            interval.tick().await;
            self.process_queue_at(Utc::now()).await;
        }
    }

    /// Get current queue size
    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_queued(&self, player_id: &Uuid) -> bool {
        self.queue.lock().await.contains(player_id)
    }
}
