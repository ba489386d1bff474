//! Minimax opponent with alpha-beta pruning

use rand::seq::SliceRandom;
use rand::Rng;

use super::board::{Board, Side, Window, COLUMNS, ROWS};
use super::error::GameError;

/// Plies searched below the current position
pub const SEARCH_DEPTH: u32 = 6;

/// Score of a realized four-in-a-row
pub const WIN_SCORE: i64 = 1_000_000;

const THREE_SCORE: i64 = 100;
const TWO_SCORE: i64 = 10;
/// Opponent threes outweigh our own threes
const OPPONENT_THREE_SCORE: i64 = -150;
const OPPONENT_TWO_SCORE: i64 = -10;
const CENTER_BONUS: i64 = 3;

/// Engine bound to the side it plays. Holds no other state.
#[derive(Debug, Clone, Copy)]
pub struct Bot {
    side: Side,
}

impl Bot {
    pub fn new(side: Side) -> Self {
        Self { side }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Pick a column using the thread-local RNG for tie-breaking
    pub fn best_move(&self, board: &Board) -> Result<usize, GameError> {
        self.best_move_with(board, &mut rand::thread_rng())
    }

    /// Pick a column: win now, else block, else search
    pub fn best_move_with<R: Rng + ?Sized>(
        &self,
        board: &Board,
        rng: &mut R,
    ) -> Result<usize, GameError> {
        let moves = board.valid_moves();
        if moves.is_empty() {
            return Err(GameError::NoLegalMove);
        }

        if let Some(col) = winning_column(board, &moves, self.side) {
            return Ok(col);
        }
        if let Some(col) = winning_column(board, &moves, self.side.opponent()) {
            return Ok(col);
        }

        let mut best_score = i64::MIN;
        let mut best_moves = Vec::with_capacity(moves.len());

        // Each root child gets a full window so tied scores are exact
        for &col in &moves {
            let mut child = *board;
            child.drop_disc(col, self.side)?;
            let score = self.minimax(&child, SEARCH_DEPTH - 1, i64::MIN, i64::MAX, false);

            if score > best_score {
                best_score = score;
                best_moves.clear();
                best_moves.push(col);
            } else if score == best_score {
                best_moves.push(col);
            }
        }

        best_moves
            .choose(rng)
            .copied()
            .ok_or(GameError::NoLegalMove)
    }

    fn minimax(&self, board: &Board, depth: u32, mut alpha: i64, mut beta: i64, maximizing: bool) -> i64 {
        let opponent = self.side.opponent();

        if board.check_win(self.side) {
            return WIN_SCORE + depth as i64;
        }
        if board.check_win(opponent) {
            return -WIN_SCORE - depth as i64;
        }
        if depth == 0 || board.is_full() {
            return self.evaluate(board);
        }

        if maximizing {
            let mut best = i64::MIN;
            for col in board.valid_moves() {
                let mut child = *board;
                if child.drop_disc(col, self.side).is_err() {
                    continue;
                }
                let eval = self.minimax(&child, depth - 1, alpha, beta, false);
                best = best.max(eval);
                alpha = alpha.max(eval);
                if beta <= alpha {
                    break;
                }
            }
            best
        } else {
            let mut best = i64::MAX;
            for col in board.valid_moves() {
                let mut child = *board;
                if child.drop_disc(col, opponent).is_err() {
                    continue;
                }
                let eval = self.minimax(&child, depth - 1, alpha, beta, true);
                best = best.min(eval);
                beta = beta.min(eval);
                if beta <= alpha {
                    break;
                }
            }
            best
        }
    }

    /// Static heuristic: center occupancy plus every window's score
    pub fn evaluate(&self, board: &Board) -> i64 {
        let center = COLUMNS / 2;
        let center_count = (0..ROWS)
            .filter(|&row| board.get(row, center) == Some(self.side))
            .count() as i64;

        center_count * CENTER_BONUS
            + board
                .windows()
                .map(|window| self.score_window(&window))
                .sum::<i64>()
    }

    fn score_window(&self, window: &Window) -> i64 {
        let own = window.iter().filter(|c| **c == Some(self.side)).count();
        let opp = window
            .iter()
            .filter(|c| **c == Some(self.side.opponent()))
            .count();
        let empty = window.len() - own - opp;

        if own > 0 && opp > 0 {
            return 0;
        }

        match (own, opp, empty) {
            (4, _, _) => WIN_SCORE,
            (3, _, 1) => THREE_SCORE,
            (2, _, 2) => TWO_SCORE,
            (_, 3, 1) => OPPONENT_THREE_SCORE,
            (_, 2, 2) => OPPONENT_TWO_SCORE,
            _ => 0,
        }
    }
}

fn winning_column(board: &Board, moves: &[usize], side: Side) -> Option<usize> {
    moves.iter().copied().find(|&col| {
        let mut trial = *board;
        trial.drop_disc(col, side).is_ok() && trial.check_win(side)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn play(board: &mut Board, moves: &[(usize, Side)]) {
        for &(col, side) in moves {
            board.drop_disc(col, side).unwrap();
        }
    }

    #[test]
    fn takes_an_immediate_win() {
        let mut board = Board::new();
        play(
            &mut board,
            &[
                (0, Side::Two),
                (6, Side::One),
                (1, Side::Two),
                (6, Side::One),
                (2, Side::Two),
            ],
        );
        // Side one threatens column 6 as well, but winning comes first
        play(&mut board, &[(6, Side::One)]);
        let bot = Bot::new(Side::Two);
        assert_eq!(bot.best_move(&board), Ok(3));
    }

    #[test]
    fn blocks_an_opponent_win() {
        let mut board = Board::new();
        play(
            &mut board,
            &[(1, Side::One), (1, Side::Two), (2, Side::One), (2, Side::Two), (3, Side::One)],
        );
        let bot = Bot::new(Side::Two);
        let col = bot.best_move(&board).unwrap();
        assert!(col == 0 || col == 4, "expected a block, got {}", col);

        // Only one open end: the block is forced
        let mut board = Board::new();
        play(&mut board, &[(0, Side::Two), (1, Side::One), (2, Side::One), (3, Side::One)]);
        assert_eq!(bot.best_move(&board), Ok(4));
    }

    #[test]
    fn blocks_a_vertical_threat() {
        let mut board = Board::new();
        play(
            &mut board,
            &[(5, Side::One), (0, Side::Two), (5, Side::One), (6, Side::Two), (5, Side::One)],
        );
        assert_eq!(Bot::new(Side::Two).best_move(&board), Ok(5));
    }

    #[test]
    fn full_board_has_no_legal_move() {
        let mut board = Board::new();
        for col in 0..COLUMNS {
            for row in 0..ROWS {
                let side = if (row + col / 2) % 2 == 0 { Side::One } else { Side::Two };
                board.drop_disc(col, side).unwrap();
            }
        }
        assert_eq!(Bot::new(Side::One).best_move(&board), Err(GameError::NoLegalMove));
    }

    #[test]
    fn always_returns_a_legal_column() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut board = Board::new();
        let bots = [Bot::new(Side::One), Bot::new(Side::Two)];
        for turn in 0..8 {
            let bot = bots[turn % 2];
            let col = bot.best_move_with(&board, &mut rng).unwrap();
            assert!(board.is_valid_move(col));
            board.drop_disc(col, bot.side()).unwrap();
        }
    }

    #[test]
    fn ties_are_broken_deterministically_for_a_seed() {
        let board = Board::new();
        let bot = Bot::new(Side::One);
        let a = bot
            .best_move_with(&board, &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();
        let b = bot
            .best_move_with(&board, &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn never_plays_under_an_opponent_win() {
        // Side one holds row 4 at columns 0..=2; a disc in column 3 lets it complete the row
        let mut board = Board::new();
        play(
            &mut board,
            &[
                (0, Side::Two),
                (0, Side::One),
                (1, Side::One),
                (1, Side::One),
                (2, Side::Two),
                (2, Side::One),
                (5, Side::Two),
                (6, Side::Two),
                (6, Side::One),
            ],
        );
        let bot = Bot::new(Side::Two);
        for seed in 0..8 {
            let col = bot
                .best_move_with(&board, &mut ChaCha8Rng::seed_from_u64(seed))
                .unwrap();
            assert_ne!(col, 3, "seed {} played under the threat", seed);
        }
    }

    #[test]
    fn prefers_the_fastest_forced_win() {
        let mut board = Board::new();
        play(
            &mut board,
            &[(2, Side::One), (6, Side::Two), (3, Side::One), (6, Side::Two)],
        );
        let bot = Bot::new(Side::One);

        // Column 1 opens threats at 0 and 4 which cannot both be blocked
        let mut double = board;
        double.drop_disc(1, Side::One).unwrap();
        assert_eq!(
            bot.minimax(&double, SEARCH_DEPTH - 1, i64::MIN, i64::MAX, false),
            WIN_SCORE + 3
        );

        for seed in 0..8 {
            let col = bot
                .best_move_with(&board, &mut ChaCha8Rng::seed_from_u64(seed))
                .unwrap();
            assert!(col == 1 || col == 4, "seed {} chose column {}", seed, col);
        }
    }

    #[test]
    fn heuristic_prefers_blocking_over_building() {
        let bot = Bot::new(Side::One);
        assert_eq!(bot.score_window(&[Some(Side::One); 4]), WIN_SCORE);
        assert_eq!(
            bot.score_window(&[Some(Side::One), Some(Side::One), Some(Side::One), None]),
            THREE_SCORE
        );
        assert_eq!(
            bot.score_window(&[Some(Side::Two), None, Some(Side::Two), Some(Side::Two)]),
            OPPONENT_THREE_SCORE
        );
        assert!(OPPONENT_THREE_SCORE.abs() > THREE_SCORE);
        assert_eq!(
            bot.score_window(&[Some(Side::One), Some(Side::Two), None, None]),
            0
        );
    }

    #[test]
    fn center_column_is_rewarded() {
        let bot = Bot::new(Side::One);
        let mut center = Board::new();
        center.drop_disc(3, Side::One).unwrap();
        let mut edge = Board::new();
        edge.drop_disc(0, Side::One).unwrap();
        assert!(bot.evaluate(&center) > bot.evaluate(&edge));
    }
}
