//! Single match lifecycle: Waiting -> InProgress -> Finished | Abandoned

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::{Board, Side};
use super::bot::Bot;
use super::error::GameError;

/// Display name given to engine-backed opponents
pub const BOT_USERNAME: &str = "Bot";

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Finished,
    Abandoned,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Abandoned)
    }
}

/// Outcome classification, set only once a match is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Player1Win,
    Player2Win,
    Draw,
    Abandoned,
}

impl MatchResult {
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::One => MatchResult::Player1Win,
            Side::Two => MatchResult::Player2Win,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchResult::Player1Win => "player1_win",
            MatchResult::Player2Win => "player2_win",
            MatchResult::Draw => "draw",
            MatchResult::Abandoned => "abandoned",
        }
    }
}

/// Seat holder in a match (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub username: String,
    /// Sole credential for resuming the seat after a disconnect
    pub session_token: String,
    pub is_bot: bool,
    pub connected: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl Player {
    pub fn human(username: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(username.into(), false, now)
    }

    pub fn bot(now: DateTime<Utc>) -> Self {
        Self::new(BOT_USERNAME.to_string(), true, now)
    }

    fn new(username: String, is_bot: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            session_token: new_session_token(),
            is_bot,
            connected: true,
            last_heartbeat: now,
            disconnected_at: None,
        }
    }
}

/// 32 random bytes, hex encoded
fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A match behind its own lock. Mutations take the write half, snapshots the read half.
pub type SharedMatch = Arc<RwLock<GameMatch>>;

/// One game's full state
#[derive(Debug, Clone)]
pub struct GameMatch {
    pub id: Uuid,
    pub player1: Player,
    pub player2: Option<Player>,
    pub board: Board,
    pub current_turn: Side,
    pub status: MatchStatus,
    pub winner: Option<Side>,
    pub result: Option<MatchResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_move_at: DateTime<Utc>,
    pub turn_started_at: DateTime<Utc>,
    pub turn_timeout: Duration,
    bot: Option<Bot>,
}

impl GameMatch {
    pub fn new(player1: Player, turn_timeout: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player1,
            player2: None,
            board: Board::new(),
            current_turn: Side::One,
            status: MatchStatus::Waiting,
            winner: None,
            result: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            last_move_at: now,
            turn_started_at: now,
            turn_timeout,
            bot: None,
        }
    }

    pub fn into_shared(self) -> SharedMatch {
        Arc::new(RwLock::new(self))
    }

    /// Seat the second player and start the clock
    pub fn add_second_player(&mut self, player2: Player, now: DateTime<Utc>) -> Result<(), GameError> {
        if self.player2.is_some() {
            return Err(GameError::MatchFull);
        }
        if self.status != MatchStatus::Waiting {
            return Err(GameError::NotInProgress);
        }

        if player2.is_bot {
            self.bot = Some(Bot::new(Side::Two));
        }
        self.player2 = Some(player2);
        self.status = MatchStatus::InProgress;
        self.started_at = Some(now);
        self.turn_started_at = now;
        Ok(())
    }

    pub fn side_of(&self, player_id: Uuid) -> Option<Side> {
        if self.player1.id == player_id {
            Some(Side::One)
        } else if self.player2.as_ref().map(|p| p.id) == Some(player_id) {
            Some(Side::Two)
        } else {
            None
        }
    }

    pub fn player(&self, side: Side) -> Option<&Player> {
        match side {
            Side::One => Some(&self.player1),
            Side::Two => self.player2.as_ref(),
        }
    }

    pub fn player_by_id(&self, player_id: Uuid) -> Option<&Player> {
        self.side_of(player_id).and_then(|side| self.player(side))
    }

    fn player_by_id_mut(&mut self, player_id: Uuid) -> Option<&mut Player> {
        match self.side_of(player_id)? {
            Side::One => Some(&mut self.player1),
            Side::Two => self.player2.as_mut(),
        }
    }

    /// Player whose turn it is
    pub fn current_player(&self) -> Option<&Player> {
        self.player(self.current_turn)
    }

    pub fn winner_player(&self) -> Option<&Player> {
        self.winner.and_then(|side| self.player(side))
    }

    /// Engine bound to the bot seat, if the bot is on turn
    pub fn bot_on_turn(&self) -> Option<Bot> {
        if self.status != MatchStatus::InProgress {
            return None;
        }
        self.bot.filter(|bot| bot.side() == self.current_turn)
    }

    pub fn has_bot(&self) -> bool {
        self.player2.as_ref().is_some_and(|p| p.is_bot)
    }

    /// Apply a move for `player_id`; returns the row the disc landed on
    pub fn make_move(&mut self, player_id: Uuid, column: usize, now: DateTime<Utc>) -> Result<usize, GameError> {
        if self.status != MatchStatus::InProgress {
            return Err(GameError::NotInProgress);
        }

        let side = self.side_of(player_id).ok_or(GameError::InvalidPlayer)?;
        if side != self.current_turn {
            return Err(GameError::NotYourTurn);
        }

        let row = self.board.drop_disc(column, side)?;
        self.last_move_at = now;

        if self.board.check_win(side) {
            self.finish(Some(side), MatchResult::win_for(side), MatchStatus::Finished, now);
        } else if self.board.is_full() {
            self.finish(None, MatchResult::Draw, MatchStatus::Finished, now);
        } else {
            self.current_turn = side.opponent();
            self.turn_started_at = now;
        }

        Ok(row)
    }

    /// Pass the turn without placing a disc. Returns false unless in progress.
    pub fn skip_turn(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != MatchStatus::InProgress {
            return false;
        }
        self.current_turn = self.current_turn.opponent();
        self.turn_started_at = now;
        true
    }

    /// Forfeit on behalf of `disconnected_player_id`; the other seat wins.
    /// Returns false when the match was already terminal.
    pub fn abandon(&mut self, disconnected_player_id: Uuid, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let winner = match self.side_of(disconnected_player_id) {
            Some(side) if self.player(side.opponent()).is_some() => Some(side.opponent()),
            _ => None,
        };
        let result = winner.map_or(MatchResult::Abandoned, MatchResult::win_for);
        self.finish(winner, result, MatchStatus::Abandoned, now);
        true
    }

    fn finish(&mut self, winner: Option<Side>, result: MatchResult, status: MatchStatus, now: DateTime<Utc>) {
        self.status = status;
        self.winner = winner;
        self.result = Some(result);
        self.finished_at = Some(now);
    }

    pub fn record_heartbeat(&mut self, player_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.player_by_id_mut(player_id) {
            Some(player) => {
                player.last_heartbeat = now;
                player.connected = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_disconnected(&mut self, player_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.player_by_id_mut(player_id) {
            Some(player) => {
                player.connected = false;
                player.disconnected_at = Some(now);
                true
            }
            None => false,
        }
    }

    pub fn mark_reconnected(&mut self, player_id: Uuid, now: DateTime<Utc>) -> Option<Player> {
        let player = self.player_by_id_mut(player_id)?;
        player.connected = true;
        player.disconnected_at = None;
        player.last_heartbeat = now;
        Some(player.clone())
    }

    /// Start of the current inactivity period: the later of start and last move
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.started_at
            .map_or(self.last_move_at, |started| started.max(self.last_move_at))
    }

    /// Seconds between start and finish, zero if either is missing
    pub fn duration_secs(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;

    const TURN_TIMEOUT: Duration = Duration::from_secs(30);

    fn started_match() -> GameMatch {
        let now = Utc::now();
        let mut game = GameMatch::new(Player::human("alice", now), TURN_TIMEOUT, now);
        game.add_second_player(Player::human("bob", now), now).unwrap();
        game
    }

    #[test]
    fn new_match_waits_for_an_opponent() {
        let now = Utc::now();
        let game = GameMatch::new(Player::human("alice", now), TURN_TIMEOUT, now);
        assert_eq!(game.status, MatchStatus::Waiting);
        assert_eq!(game.current_turn, Side::One);
        assert!(game.result.is_none());
        assert!(game.started_at.is_none());
    }

    #[test]
    fn second_player_starts_the_match() {
        let game = started_match();
        assert_eq!(game.status, MatchStatus::InProgress);
        assert!(game.started_at.is_some());
        assert!(!game.has_bot());
    }

    #[test]
    fn second_seat_cannot_be_taken_twice() {
        let mut game = started_match();
        let now = Utc::now();
        assert_eq!(game.add_second_player(Player::bot(now), now), Err(GameError::MatchFull));
        assert_eq!(game.player2.as_ref().map(|p| p.username.as_str()), Some("bob"));
    }

    #[test]
    fn bot_opponent_gets_an_engine() {
        let now = Utc::now();
        let mut game = GameMatch::new(Player::human("alice", now), TURN_TIMEOUT, now);
        game.add_second_player(Player::bot(now), now).unwrap();
        assert!(game.has_bot());
        assert!(game.bot_on_turn().is_none());
        let p1 = game.player1.id;
        game.make_move(p1, 3, now).unwrap();
        assert_eq!(game.bot_on_turn().map(|b| b.side()), Some(Side::Two));
    }

    #[test]
    fn moves_require_an_active_match() {
        let now = Utc::now();
        let mut game = GameMatch::new(Player::human("alice", now), TURN_TIMEOUT, now);
        let p1 = game.player1.id;
        assert_eq!(game.make_move(p1, 0, now), Err(GameError::NotInProgress));
    }

    #[test]
    fn turn_alternates_only_on_successful_moves() {
        let mut game = started_match();
        let p1 = game.player1.id;
        let p2 = game.player2.as_ref().unwrap().id;
        let now = Utc::now();

        assert_eq!(game.make_move(p2, 0, now), Err(GameError::NotYourTurn));
        assert_eq!(game.make_move(Uuid::new_v4(), 0, now), Err(GameError::InvalidPlayer));
        assert_eq!(game.make_move(p1, 9, now), Err(GameError::InvalidColumn));
        assert_eq!(game.current_turn, Side::One);

        assert_eq!(game.make_move(p1, 0, now), Ok(5));
        assert_eq!(game.current_turn, Side::Two);
        assert_eq!(game.make_move(p2, 0, now), Ok(4));
        assert_eq!(game.current_turn, Side::One);
    }

    #[test]
    fn full_column_is_rejected_without_flipping_turn() {
        let mut game = started_match();
        let p1 = game.player1.id;
        let p2 = game.player2.as_ref().unwrap().id;
        let now = Utc::now();
        for i in 0..6 {
            let mover = if i % 2 == 0 { p1 } else { p2 };
            game.make_move(mover, 2, now).unwrap();
        }
        assert_eq!(game.make_move(p1, 2, now), Err(GameError::ColumnFull));
        assert_eq!(game.current_turn, Side::One);
    }

    #[test]
    fn four_across_the_bottom_wins() {
        let mut game = started_match();
        let p1 = game.player1.id;
        let p2 = game.player2.as_ref().unwrap().id;
        let now = Utc::now();
        for col in 0..3 {
            game.make_move(p1, col, now).unwrap();
            game.make_move(p2, col, now).unwrap();
        }
        game.make_move(p1, 3, now).unwrap();

        assert_eq!(game.status, MatchStatus::Finished);
        assert_eq!(game.winner, Some(Side::One));
        assert_eq!(game.result, Some(MatchResult::Player1Win));
        assert_eq!(game.winner_player().map(|p| p.id), Some(p1));
        assert!(game.finished_at.is_some());
        assert_eq!(game.make_move(p2, 4, now), Err(GameError::NotInProgress));
    }

    #[test]
    fn filling_the_board_without_a_line_is_a_draw() {
        let mut game = started_match();
        let p1 = game.player1.id;
        let p2 = game.player2.as_ref().unwrap().id;
        let now = Utc::now();

        // Column pairs filled in the order 0,1 / 2,3 / 4,5 then 6 never line up four
        let order = [0, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, 2, 3, 2, 3, 2, 3, 3, 2, 3, 2, 3, 2, 4, 5,
            4, 5, 4, 5, 5, 4, 5, 4, 5, 4, 6, 6, 6, 6, 6, 6];
        for (i, col) in order.iter().enumerate() {
            let mover = if i % 2 == 0 { p1 } else { p2 };
            game.make_move(mover, *col, now).unwrap();
        }

        assert_eq!(game.status, MatchStatus::Finished);
        assert_eq!(game.result, Some(MatchResult::Draw));
        assert!(game.winner.is_none());
    }

    #[test]
    fn skip_turn_leaves_board_and_last_move_alone() {
        let mut game = started_match();
        let before = game.last_move_at;
        let later = before + TimeDelta::seconds(31);
        assert!(game.skip_turn(later));
        assert_eq!(game.current_turn, Side::Two);
        assert_eq!(game.turn_started_at, later);
        assert_eq!(game.last_move_at, before);
        assert_eq!(game.board.disc_count(), 0);
    }

    #[test]
    fn abandon_awards_the_other_seat() {
        let mut game = started_match();
        let p2 = game.player2.as_ref().unwrap().id;
        assert!(game.abandon(p2, Utc::now()));
        assert_eq!(game.status, MatchStatus::Abandoned);
        assert_eq!(game.winner, Some(Side::One));
        assert_eq!(game.result, Some(MatchResult::Player1Win));
        assert!(!game.abandon(game.player1.id, Utc::now()));
        assert_eq!(game.winner, Some(Side::One));
    }

    #[test]
    fn abandoning_a_waiting_match_has_no_winner() {
        let now = Utc::now();
        let mut game = GameMatch::new(Player::human("alice", now), TURN_TIMEOUT, now);
        let p1 = game.player1.id;
        assert!(game.abandon(p1, now));
        assert!(game.winner.is_none());
        assert_eq!(game.result, Some(MatchResult::Abandoned));
    }

    #[test]
    fn finished_match_ignores_abandon() {
        let mut game = started_match();
        let p1 = game.player1.id;
        let p2 = game.player2.as_ref().unwrap().id;
        let now = Utc::now();
        for col in 0..3 {
            game.make_move(p1, col, now).unwrap();
            game.make_move(p2, col, now).unwrap();
        }
        game.make_move(p1, 3, now).unwrap();
        assert!(!game.abandon(p1, now));
        assert_eq!(game.status, MatchStatus::Finished);
    }

    #[test]
    fn connectivity_setters_never_touch_status() {
        let mut game = started_match();
        let p1 = game.player1.id;
        let now = Utc::now();

        assert!(game.mark_disconnected(p1, now));
        assert!(!game.player1.connected);
        assert_eq!(game.player1.disconnected_at, Some(now));

        let later = now + TimeDelta::seconds(5);
        let player = game.mark_reconnected(p1, later).unwrap();
        assert!(player.connected);
        assert!(player.disconnected_at.is_none());
        assert_eq!(player.last_heartbeat, later);

        assert!(game.record_heartbeat(p1, later));
        assert!(!game.record_heartbeat(Uuid::new_v4(), later));
        assert_eq!(game.status, MatchStatus::InProgress);
    }

    #[test]
    fn session_tokens_are_unique_and_opaque() {
        let now = Utc::now();
        let a = Player::human("a", now);
        let b = Player::human("a", now);
        assert_ne!(a.session_token, b.session_token);
        assert_eq!(a.session_token.len(), 64);
    }
}
