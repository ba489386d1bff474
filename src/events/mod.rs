//! Analytics events (fire-and-forget)

pub mod sink;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::game::{GameMatch, RegistryStats};

pub use sink::{EventSink, HttpEventSink, LogEventSink};

/// Structured events published to the analytics collector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    MatchStarted {
        match_id: Uuid,
        players: Vec<String>,
        is_bot_game: bool,
        timestamp: DateTime<Utc>,
    },
    MoveMade {
        match_id: Uuid,
        player: String,
        column: usize,
        row: usize,
        move_number: usize,
        is_bot_move: bool,
        timestamp: DateTime<Utc>,
    },
    MatchFinished {
        match_id: Uuid,
        players: Vec<String>,
        winner: Option<String>,
        result: String,
        duration_secs: f64,
        total_moves: usize,
        was_bot_game: bool,
        timestamp: DateTime<Utc>,
    },
    SystemMetrics {
        #[serde(flatten)]
        stats: RegistryStats,
        timestamp: DateTime<Utc>,
    },
}

fn usernames(game: &GameMatch) -> Vec<String> {
    std::iter::once(&game.player1)
        .chain(game.player2.as_ref())
        .map(|p| p.username.clone())
        .collect()
}

impl AnalyticsEvent {
    pub fn match_started(game: &GameMatch, now: DateTime<Utc>) -> Self {
        AnalyticsEvent::MatchStarted {
            match_id: game.id,
            players: usernames(game),
            is_bot_game: game.has_bot(),
            timestamp: now,
        }
    }

    pub fn move_made(game: &GameMatch, player_id: Uuid, column: usize, row: usize, now: DateTime<Utc>) -> Self {
        let player = game.player_by_id(player_id);
        AnalyticsEvent::MoveMade {
            match_id: game.id,
            player: player.map(|p| p.username.clone()).unwrap_or_default(),
            column,
            row,
            move_number: game.board.disc_count(),
            is_bot_move: player.is_some_and(|p| p.is_bot),
            timestamp: now,
        }
    }

    pub fn match_finished(game: &GameMatch, now: DateTime<Utc>) -> Self {
        AnalyticsEvent::MatchFinished {
            match_id: game.id,
            players: usernames(game),
            winner: game.winner_player().map(|p| p.username.clone()),
            result: game.result.map(|r| r.as_str()).unwrap_or_default().to_string(),
            duration_secs: game.duration_secs(),
            total_moves: game.board.disc_count(),
            was_bot_game: game.has_bot(),
            timestamp: now,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsEvent::MatchStarted { .. } => "match_started",
            AnalyticsEvent::MoveMade { .. } => "move_made",
            AnalyticsEvent::MatchFinished { .. } => "match_finished",
            AnalyticsEvent::SystemMetrics { .. } => "system_metrics",
        }
    }
}
