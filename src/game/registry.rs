//! Registry of live matches, their lookup indices, and time-driven forfeits

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GameTimings;
use crate::events::{AnalyticsEvent, EventSink};
use crate::store::{persist_match, GameStore};
use crate::util::time::exceeded;

use super::error::GameError;
use super::r#match::{GameMatch, MatchStatus, Player, SharedMatch};
use super::snapshot::MatchSnapshot;

/// Published after every successful state change of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchNotice {
    pub match_id: Uuid,
}

/// Point-in-time counts for health checks and metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub active_matches: usize,
    pub waiting: usize,
    pub in_progress: usize,
    pub finished: usize,
    pub abandoned: usize,
    pub bot_matches: usize,
    pub human_matches: usize,
    pub tracked_players: usize,
    pub connected_players: usize,
}

/// Matches plus the player/session indices pointing into them.
/// All three maps change together under one write lock.
#[derive(Default)]
struct RegistryIndex {
    matches: HashMap<Uuid, SharedMatch>,
    players: HashMap<Uuid, Uuid>,
    sessions: HashMap<String, Uuid>,
}

impl RegistryIndex {
    fn index_player(&mut self, match_id: Uuid, player: &Player) {
        self.players.insert(player.id, match_id);
        self.sessions.insert(player.session_token.clone(), match_id);
    }
}

enum TurnAction {
    Forfeit(Uuid),
    Skipped { bot_next: bool },
}

/// Owns every live match.
///
/// The registry lock only guards the index maps. It is taken before a match
/// lock when both are needed (only `join_match` nests them) and is never held
/// during I/O or while notifying listeners.
pub struct MatchRegistry {
    index: RwLock<RegistryIndex>,
    timings: GameTimings,
    store: Arc<dyn GameStore>,
    events: Arc<dyn EventSink>,
    notices: mpsc::UnboundedSender<MatchNotice>,
}

impl MatchRegistry {
    /// Build a registry together with the receiving end of its change notices
    pub fn new(
        timings: GameTimings,
        store: Arc<dyn GameStore>,
        events: Arc<dyn EventSink>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MatchNotice>) {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            index: RwLock::new(RegistryIndex::default()),
            timings,
            store,
            events,
            notices,
        });
        (registry, notice_rx)
    }

    pub fn timings(&self) -> &GameTimings {
        &self.timings
    }

    /// Create a waiting match for `player1`
    pub fn create_match(&self, player1: Player) -> SharedMatch {
        let game = GameMatch::new(player1, self.timings.turn_timeout, Utc::now());
        let match_id = game.id;
        let username = game.player1.username.clone();
        let shared = {
            let player1 = game.player1.clone();
            let shared = game.into_shared();
            let mut index = self.index.write();
            index.matches.insert(match_id, shared.clone());
            index.index_player(match_id, &player1);
            shared
        };

        info!(match_id = %match_id, player = %username, "Match created");
        shared
    }

    /// Seat `player2` in a waiting match and start it
    pub fn join_match(self: &Arc<Self>, match_id: Uuid, player2: Player) -> Result<SharedMatch, GameError> {
        let now = Utc::now();

        // Seat and index under one index lock: a removed match never gains a player
        let (shared, seated, started) = {
            let mut index = self.index.write();
            let shared = index.matches.get(&match_id).cloned().ok_or(GameError::NotFound)?;
            let (seated, started) = {
                let mut game = shared.write();
                game.add_second_player(player2, now)?;
                let seated = game.player2.clone().ok_or(GameError::InvalidPlayer)?;
                (seated, AnalyticsEvent::match_started(&game, now))
            };
            index.index_player(match_id, &seated);
            (shared, seated, started)
        };

        info!(
            match_id = %match_id,
            player = %seated.username,
            is_bot = seated.is_bot,
            "Second player joined, match started"
        );

        self.events.publish(started);
        self.notify(match_id);
        Ok(shared)
    }

    pub fn get(&self, match_id: Uuid) -> Result<SharedMatch, GameError> {
        self.index
            .read()
            .matches
            .get(&match_id)
            .cloned()
            .ok_or(GameError::NotFound)
    }

    pub fn get_by_player(&self, player_id: Uuid) -> Result<SharedMatch, GameError> {
        let index = self.index.read();
        index
            .players
            .get(&player_id)
            .and_then(|match_id| index.matches.get(match_id))
            .cloned()
            .ok_or(GameError::NotFound)
    }

    pub fn snapshot(&self, match_id: Uuid) -> Result<MatchSnapshot, GameError> {
        let shared = self.get(match_id)?;
        let game = shared.read();
        Ok(MatchSnapshot::from_match(&game))
    }

    /// Ask listeners to broadcast the current state of `match_id`
    pub fn notify(&self, match_id: Uuid) {
        if self.notices.send(MatchNotice { match_id }).is_err() {
            debug!(match_id = %match_id, "No notice listener attached");
        }
    }

    /// Apply a move and run the finish sequence if it ended the match
    pub fn make_move(self: &Arc<Self>, match_id: Uuid, player_id: Uuid, column: usize) -> Result<usize, GameError> {
        let shared = self.get(match_id)?;
        let now = Utc::now();

        let (row, moved, finished, bot_next) = {
            let mut game = shared.write();
            let row = game.make_move(player_id, column, now)?;
            (
                row,
                AnalyticsEvent::move_made(&game, player_id, column, row, now),
                game.status.is_terminal(),
                game.bot_on_turn().is_some(),
            )
        };

        debug!(match_id = %match_id, player_id = %player_id, column, row, "Move applied");
        self.events.publish(moved);

        if finished {
            self.finish_match(&shared);
        }
        self.notify(match_id);

        if bot_next {
            self.schedule_bot_move(match_id);
        }
        Ok(row)
    }

    /// Let the engine play for the bot seat currently on turn
    pub async fn handle_bot_move(self: &Arc<Self>, match_id: Uuid) -> Result<usize, GameError> {
        let shared = self.get(match_id)?;

        let (bot, board, bot_id) = {
            let game = shared.read();
            let bot = game.bot_on_turn().ok_or(GameError::NotBotTurn)?;
            let bot_id = game
                .player(bot.side())
                .map(|p| p.id)
                .ok_or(GameError::NotBotTurn)?;
            (bot, game.board, bot_id)
        };

        let column = tokio::task::spawn_blocking(move || bot.best_move(&board))
            .await
            .map_err(|e| {
                error!(match_id = %match_id, error = %e, "Bot search task failed");
                GameError::SearchFailed
            })??;

        self.make_move(match_id, bot_id, column)
    }

    /// Deferred bot turn with a short pacing delay
    fn schedule_bot_move(self: &Arc<Self>, match_id: Uuid) {
        let registry = Arc::clone(self);
        let delay = self.timings.bot_move_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match registry.handle_bot_move(match_id).await {
                Ok(row) => debug!(match_id = %match_id, row, "Bot moved"),
                Err(GameError::NotBotTurn) | Err(GameError::NotFound) => {
                    debug!(match_id = %match_id, "Bot move no longer needed");
                }
                Err(e) => warn!(match_id = %match_id, error = %e, "Bot move failed"),
            }
        });
    }

    /// Refresh a player's liveness. Returns true when it brought a disconnected
    /// seat back, in which case listeners are notified.
    pub fn heartbeat(&self, player_id: Uuid) -> Result<bool, GameError> {
        let shared = self.get_by_player(player_id)?;

        let (match_id, restored) = {
            let mut game = shared.write();
            let was_connected = game
                .player_by_id(player_id)
                .map(|p| p.connected)
                .ok_or(GameError::InvalidPlayer)?;
            game.record_heartbeat(player_id, Utc::now());
            (game.id, !was_connected)
        };

        if restored {
            info!(match_id = %match_id, player_id = %player_id, "Player back online via heartbeat");
            self.notify(match_id);
        }
        Ok(restored)
    }

    pub fn set_disconnected(&self, player_id: Uuid) {
        let Ok(shared) = self.get_by_player(player_id) else {
            return;
        };

        let match_id = {
            let mut game = shared.write();
            game.mark_disconnected(player_id, Utc::now());
            game.id
        };

        info!(match_id = %match_id, player_id = %player_id, "Player disconnected");
        self.notify(match_id);
    }

    pub fn reconnect_by_session(&self, token: &str) -> Result<(SharedMatch, Player), GameError> {
        self.reconnect_by_session_at(token, Utc::now())
    }

    /// Resume the seat owning `token` if its disconnect is within the window
    pub fn reconnect_by_session_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(SharedMatch, Player), GameError> {
        let match_id = self
            .index
            .read()
            .sessions
            .get(token)
            .copied()
            .ok_or(GameError::SessionNotFound)?;

        let shared = match self.get(match_id) {
            Ok(shared) => shared,
            Err(_) => {
                self.index.write().sessions.remove(token);
                return Err(GameError::SessionNotFound);
            }
        };

        let player = {
            let mut game = shared.write();
            let seat = std::iter::once(&game.player1)
                .chain(game.player2.as_ref())
                .find(|p| p.session_token == token)
                .map(|p| (p.id, p.disconnected_at))
                .ok_or(GameError::SessionNotFound)?;

            let (player_id, disconnected_at) = seat;
            if disconnected_at.is_some_and(|at| exceeded(at, now, self.timings.reconnect_window)) {
                return Err(GameError::ReconnectWindowExpired);
            }
            game.mark_reconnected(player_id, now)
                .ok_or(GameError::SessionNotFound)?
        };

        info!(match_id = %match_id, player_id = %player.id, "Player reconnected");
        self.notify(match_id);
        Ok((shared, player))
    }

    fn all_matches(&self) -> Vec<SharedMatch> {
        self.index.read().matches.values().cloned().collect()
    }

    fn is_unresponsive(&self, player: &Player, now: DateTime<Utc>) -> bool {
        if player.is_bot {
            return false;
        }
        if player.connected {
            exceeded(player.last_heartbeat, now, self.timings.heartbeat_timeout)
        } else {
            player
                .disconnected_at
                .is_some_and(|at| exceeded(at, now, self.timings.reconnect_window))
        }
    }

    /// Forfeit players that stopped heartbeating or never came back
    pub fn sweep_disconnects_at(self: &Arc<Self>, now: DateTime<Utc>) {
        for shared in self.all_matches() {
            let (match_id, username) = {
                let mut game = shared.write();
                if game.status != MatchStatus::InProgress {
                    continue;
                }

                let stale = std::iter::once(&game.player1)
                    .chain(game.player2.as_ref())
                    .find(|p| self.is_unresponsive(p, now))
                    .map(|p| (p.id, p.username.clone()));

                let Some((player_id, username)) = stale else {
                    continue;
                };
                if !game.abandon(player_id, now) {
                    continue;
                }
                (game.id, username)
            };

            info!(match_id = %match_id, player = %username, "Player timed out, match abandoned");
            self.finish_match(&shared);
            self.notify(match_id);
        }
    }

    /// Skip expired turns and forfeit matches idle past the inactivity limit
    pub fn sweep_turns_at(self: &Arc<Self>, now: DateTime<Utc>) {
        for shared in self.all_matches() {
            let (match_id, action) = {
                let mut game = shared.write();
                if game.status != MatchStatus::InProgress {
                    continue;
                }

                let action = if exceeded(game.last_activity(), now, self.timings.inactivity_limit) {
                    let Some(on_turn) = game.current_player().map(|p| p.id) else {
                        continue;
                    };
                    if !game.abandon(on_turn, now) {
                        continue;
                    }
                    TurnAction::Forfeit(on_turn)
                } else if exceeded(game.turn_started_at, now, game.turn_timeout) {
                    game.skip_turn(now);
                    TurnAction::Skipped {
                        bot_next: game.bot_on_turn().is_some(),
                    }
                } else {
                    continue;
                };
                (game.id, action)
            };

            match action {
                TurnAction::Forfeit(player_id) => {
                    info!(match_id = %match_id, player_id = %player_id, "No move within inactivity limit, match abandoned");
                    self.finish_match(&shared);
                    self.notify(match_id);
                }
                TurnAction::Skipped { bot_next } => {
                    info!(match_id = %match_id, "Turn timed out, skipped");
                    self.notify(match_id);
                    if bot_next {
                        self.schedule_bot_move(match_id);
                    }
                }
            }
        }
    }

    /// Persist, report, and schedule eviction. Called once per terminal transition.
    fn finish_match(self: &Arc<Self>, shared: &SharedMatch) {
        let now = Utc::now();
        let (game, finished) = {
            let game = shared.read();
            let finished = AnalyticsEvent::match_finished(&game, now);
            (game.clone(), finished)
        };

        let match_id = game.id;
        info!(
            match_id = %match_id,
            result = game.result.map(|r| r.as_str()).unwrap_or_default(),
            winner = game.winner_player().map(|p| p.username.as_str()).unwrap_or("none"),
            "Match finished"
        );

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = persist_match(store.as_ref(), &game).await {
                error!(match_id = %game.id, error = %e, "Failed to save finished match");
            }
        });

        self.events.publish(finished);
        self.schedule_removal(match_id);
    }

    fn schedule_removal(self: &Arc<Self>, match_id: Uuid) {
        let registry = Arc::downgrade(self);
        let grace = self.timings.eviction_grace;

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(registry) = registry.upgrade() {
                registry.remove_match(match_id);
            }
        });
    }

    /// Drop a match and every index entry pointing at it. Returns false if already gone.
    pub fn remove_match(&self, match_id: Uuid) -> bool {
        let removed = {
            let mut index = self.index.write();
            let removed = index.matches.remove(&match_id).is_some();
            if removed {
                index.players.retain(|_, id| *id != match_id);
                index.sessions.retain(|_, id| *id != match_id);
            }
            removed
        };

        if removed {
            info!(match_id = %match_id, "Match removed from registry");
        }
        removed
    }

    /// Drop the waiting match of a player who left before being paired
    pub fn discard_waiting(&self, player_id: Uuid) -> bool {
        let Ok(shared) = self.get_by_player(player_id) else {
            return false;
        };
        let (match_id, waiting) = {
            let game = shared.read();
            (game.id, game.status == MatchStatus::Waiting)
        };
        waiting && self.remove_match(match_id)
    }

    pub fn stats(&self) -> RegistryStats {
        let (matches, tracked_players) = {
            let index = self.index.read();
            (
                index.matches.values().cloned().collect::<Vec<_>>(),
                index.players.len(),
            )
        };

        let mut stats = RegistryStats {
            active_matches: matches.len(),
            tracked_players,
            ..RegistryStats::default()
        };

        for shared in matches {
            let game = shared.read();
            match game.status {
                MatchStatus::Waiting => stats.waiting += 1,
                MatchStatus::InProgress => stats.in_progress += 1,
                MatchStatus::Finished => stats.finished += 1,
                MatchStatus::Abandoned => stats.abandoned += 1,
            }
            match &game.player2 {
                Some(p) if p.is_bot => stats.bot_matches += 1,
                Some(_) => stats.human_matches += 1,
                None => {}
            }
            stats.connected_players += std::iter::once(&game.player1)
                .chain(game.player2.as_ref())
                .filter(|p| p.connected && !p.is_bot)
                .count();
        }

        stats
    }

    pub async fn run_disconnect_sweep(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.timings.disconnect_sweep);
        loop {
            interval.tick().await;
            self.sweep_disconnects_at(Utc::now());
        }
    }

    pub async fn run_turn_sweep(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.timings.turn_sweep);
        loop {
            interval.tick().await;
            self.sweep_turns_at(Utc::now());
        }
    }

    /// Periodic `system_metrics` events
    pub async fn run_metrics(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.timings.metrics_interval);
        loop {
            interval.tick().await;
            let stats = self.stats();
            info!(
                active_matches = stats.active_matches,
                in_progress = stats.in_progress,
                connected_players = stats.connected_players,
                "System metrics"
            );
            self.events.publish(AnalyticsEvent::SystemMetrics {
                stats,
                timestamp: Utc::now(),
            });
        }
    }
}
