//! Connect-four grid with gravity-drop placement

use serde::{Deserialize, Serialize};

pub const ROWS: usize = 6;
pub const COLUMNS: usize = 7;

/// Number of aligned discs needed to win
pub const CONNECT: usize = 4;

/// Scan directions as (row delta, column delta): horizontal, vertical,
/// down-right diagonal, up-right diagonal
static DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

/// One of the two disc colors in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    /// Wire value (1 or 2)
    pub fn as_u8(self) -> u8 {
        match self {
            Side::One => 1,
            Side::Two => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Side::One),
            2 => Some(Side::Two),
            _ => None,
        }
    }
}

/// A 4-cell line used for win detection and heuristic scoring
pub type Window = [Option<Side>; CONNECT];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("invalid column")]
    InvalidColumn,

    #[error("column is full")]
    ColumnFull,

    #[error("invalid board shape: {0}")]
    InvalidShape(String),
}

/// Fixed 6x7 grid. Row 0 is the top, row 5 the bottom.
///
/// `Board` is `Copy`, so every speculative placement works on an
/// independent value and never aliases the original grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    grid: [[Option<Side>; COLUMNS]; ROWS],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<Side> {
        self.grid[row][column]
    }

    /// Drop a disc into `column`; returns the row it landed on
    pub fn drop_disc(&mut self, column: usize, side: Side) -> Result<usize, BoardError> {
        if column >= COLUMNS {
            return Err(BoardError::InvalidColumn);
        }

        for row in (0..ROWS).rev() {
            if self.grid[row][column].is_none() {
                self.grid[row][column] = Some(side);
                return Ok(row);
            }
        }

        Err(BoardError::ColumnFull)
    }

    pub fn is_valid_move(&self, column: usize) -> bool {
        column < COLUMNS && self.grid[0][column].is_none()
    }

    /// Columns that still have at least one empty cell, left to right
    pub fn valid_moves(&self) -> Vec<usize> {
        (0..COLUMNS).filter(|&col| self.is_valid_move(col)).collect()
    }

    pub fn check_win(&self, side: Side) -> bool {
        self.windows()
            .any(|window| window.iter().all(|cell| *cell == Some(side)))
    }

    pub fn is_full(&self) -> bool {
        self.grid[0].iter().all(Option::is_some)
    }

    pub fn disc_count(&self) -> usize {
        self.grid.iter().flatten().filter(|cell| cell.is_some()).count()
    }

    /// Every 4-cell window in all four orientations
    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        DIRECTIONS.iter().flat_map(move |&(d_row, d_col)| {
            (0..ROWS).flat_map(move |row| {
                (0..COLUMNS).filter_map(move |col| self.window(row, col, d_row, d_col))
            })
        })
    }

    fn window(&self, row: usize, col: usize, d_row: isize, d_col: isize) -> Option<Window> {
        let mut cells = [None; CONNECT];
        for (i, cell) in cells.iter_mut().enumerate() {
            let r = row as isize + d_row * i as isize;
            let c = col as isize + d_col * i as isize;
            if r < 0 || r >= ROWS as isize || c < 0 || c >= COLUMNS as isize {
                return None;
            }
            *cell = self.grid[r as usize][c as usize];
        }
        Some(cells)
    }

    /// Wire form: 6 rows of 7 cells, 0 = empty, 1 = side one, 2 = side two
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.grid
            .iter()
            .map(|row| row.iter().map(|cell| cell.map_or(0, Side::as_u8)).collect())
            .collect()
    }

    /// Rebuild a board from its wire form
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, BoardError> {
        if rows.len() != ROWS {
            return Err(BoardError::InvalidShape(format!(
                "expected {} rows, got {}",
                ROWS,
                rows.len()
            )));
        }

        let mut board = Board::new();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != COLUMNS {
                return Err(BoardError::InvalidShape(format!(
                    "row {} has {} cells, expected {}",
                    r,
                    row.len(),
                    COLUMNS
                )));
            }
            for (c, &value) in row.iter().enumerate() {
                board.grid[r][c] = match value {
                    0 => None,
                    v => Some(Side::from_u8(v).ok_or_else(|| {
                        BoardError::InvalidShape(format!("cell ({}, {}) has value {}", r, c, v))
                    })?),
                };
            }
        }
        Ok(board)
    }
}
