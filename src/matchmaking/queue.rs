//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::game::Player;
use crate::util::time::reached;

/// Player waiting for an opponent, together with the match already created for them
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub player_id: Uuid,
    pub username: String,
    pub match_id: Uuid,
    pub queued_at: DateTime<Utc>,
}

impl QueuedPlayer {
    pub fn new(player: &Player, match_id: Uuid, queued_at: DateTime<Utc>) -> Self {
        Self {
            player_id: player.id,
            username: player.username.clone(),
            match_id,
            queued_at,
        }
    }
}

/// FIFO of waiting players. Enqueue order is also `queued_at` order.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to the back of the queue
    pub fn enqueue(&mut self, player: QueuedPlayer) {
        // A player is queued at most once
        self.queue.retain(|p| p.player_id != player.player_id);
        self.queue.push_back(player);
    }

    /// Oldest waiting player
    pub fn pop_front(&mut self) -> Option<QueuedPlayer> {
        self.queue.pop_front()
    }

    /// Remove a player from the queue
    pub fn dequeue(&mut self, player_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.player_id == player_id)?;
        self.queue.remove(pos)
    }

    pub fn contains(&self, player_id: &Uuid) -> bool {
        self.queue.iter().any(|p| &p.player_id == player_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every request that has waited at least `timeout`
    pub fn drain_expired(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<QueuedPlayer> {
        let expired = self
            .queue
            .iter()
            .take_while(|p| reached(p.queued_at, now, timeout))
            .count();
        self.queue.drain(..expired).collect()
    }
}
