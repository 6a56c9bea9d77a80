use log::warn;
use rand::Rng;

use crate::error::{Error, Result};

pub const WALL_REWARD: f64 = -100.0;

/// Contents of a board coordinate.
///
/// `Wall` is never stored: it is what every coordinate outside the board
/// reads as. `AgentMarker` only appears in [`GridWorld::view_at`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Food,
    Poison,
    Wall,
    AgentMarker,
}

impl Cell {
    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Food => 'F',
            Cell::Poison => 'P',
            Cell::Wall => 'W',
            Cell::AgentMarker => 'A',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RewardTable {
    food: f64,
    poison: f64,
}

impl RewardTable {
    pub fn basic() -> Self {
        Self { food: 1.0, poison: -1.0 }
    }

    pub fn amplified() -> Self {
        Self { food: 4.0, poison: -4.0 }
    }

    pub fn reward(&self, cell: Cell) -> f64 {
        match cell {
            Cell::Empty | Cell::AgentMarker => 0.0,
            Cell::Food => self.food,
            Cell::Poison => self.poison,
            Cell::Wall => WALL_REWARD,
        }
    }

    /// A wall collision is the only reward that ends a trial.
    pub fn is_terminal(reward: f64) -> bool {
        reward == WALL_REWARD
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        Self::basic()
    }
}

// Facing of the agent
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn into_vector(self) -> (isize, isize)
    {
        match self {
            Direction::North => (-1, 0),
            Direction::South => ( 1, 0),
            Direction::West  => ( 0,-1),
            Direction::East  => ( 0, 1),
        }
    }

    pub fn left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    pub fn right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }
}

/// Board coordinate. `x` indexes rows and `y` columns; either may leave the
/// board, which is how a wall collision is represented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Pos {
    pub x: isize,
    pub y: isize,
}

impl Pos {
    pub fn new(x: isize, y: isize) -> Self {
        Self { x, y }
    }

    pub fn offset(self, direction: Direction, distance: isize) -> Pos {
        let (dx, dy) = direction.into_vector();
        Pos { x: self.x + dx * distance, y: self.y + dy * distance }
    }
}

pub struct GridWorld {
    board: Vec<Vec<Cell>>,
    rows: usize,
    cols: usize,
    agent: Pos,
    rewards: RewardTable,
}

impl GridWorld {
    /// Generates a random board.
    ///
    /// Every cell is Food with probability 1/2, otherwise Poison with
    /// probability 1/2, otherwise Empty. Before settling on Empty a 1-in-16
    /// draw may claim the cell as the agent start, until one start is taken.
    pub fn random<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        rewards: RewardTable,
        rng: &mut R,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidBoard(
                format!("board must be non-empty, got {}x{}", rows, cols)));
        }
        let mut board = Vec::with_capacity(rows);
        let mut start: Option<Pos> = None;
        for x in 0..rows {
            let mut row = Vec::with_capacity(cols);
            for y in 0..cols {
                let cell = if rng.gen_bool(0.5) {
                    Cell::Food
                } else if rng.gen_bool(0.5) {
                    Cell::Poison
                } else {
                    if start.is_none() && rng.gen_range(0..16) == 0 {
                        start = Some(Pos::new(x as isize, y as isize));
                    }
                    Cell::Empty
                };
                row.push(cell);
            }
            board.push(row);
        }

        let start = match start {
            Some(pos) => pos,
            None => Self::fallback_start(&mut board, rows, cols, rng),
        };

        Ok(Self { board, rows, cols, agent: start, rewards })
    }

    // The placement draw never fired: promote some Empty cell, or clear one
    // when the board has none.
    fn fallback_start<R: Rng + ?Sized>(
        board: &mut Vec<Vec<Cell>>,
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Pos {
        let empties: Vec<Pos> = EnvIter::new(rows, cols)
            .filter(|pos| board[pos.x as usize][pos.y as usize] == Cell::Empty)
            .collect();
        if empties.is_empty() {
            let pos = Pos::new(rng.gen_range(0..rows) as isize, rng.gen_range(0..cols) as isize);
            warn!("board {}x{} has no empty cell, clearing {:?} for the agent", rows, cols, pos);
            board[pos.x as usize][pos.y as usize] = Cell::Empty;
            pos
        } else {
            empties[rng.gen_range(0..empties.len())]
        }
    }

    /// Builds a board from explicit contents. Rows must be equally long and
    /// hold only Empty, Food or Poison; the start must be on the board.
    pub fn from_cells(board: Vec<Vec<Cell>>, start: Pos, rewards: RewardTable) -> Result<Self> {
        let rows = board.len();
        let cols = board.first().map_or(0, |row| row.len());
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidBoard("board must be non-empty".to_string()));
        }
        if board.iter().any(|row| row.len() != cols) {
            return Err(Error::InvalidBoard("rows must all have the same length".to_string()));
        }
        if let Some(cell) = board.iter().flatten()
            .find(|c| !matches!(c, Cell::Empty | Cell::Food | Cell::Poison))
        {
            return Err(Error::InvalidBoard(format!("{:?} cannot be stored on the board", cell)));
        }
        let world = Self { board, rows, cols, agent: start, rewards };
        if !world.in_bounds(start) {
            return Err(Error::InvalidBoard(format!("start {:?} lies outside the board", start)));
        }
        Ok(world)
    }

    pub fn rows(&self) -> usize { self.rows }

    pub fn cols(&self) -> usize { self.cols }

    pub fn agent_pos(&self) -> Pos { self.agent }

    pub fn rewards(&self) -> &RewardTable { &self.rewards }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.rows && (pos.y as usize) < self.cols
    }

    /// What the agent senses and is rewarded for at `(x, y)`.
    pub fn cell_at(&self, x: isize, y: isize) -> Cell {
        let pos = Pos::new(x, y);
        if self.in_bounds(pos) {
            self.board[x as usize][y as usize]
        } else {
            Cell::Wall
        }
    }

    /// Like [`GridWorld::cell_at`], with the live agent position reading as
    /// `AgentMarker`.
    pub fn view_at(&self, x: isize, y: isize) -> Cell {
        let pos = Pos::new(x, y);
        if pos == self.agent && self.in_bounds(pos) {
            Cell::AgentMarker
        } else {
            self.cell_at(x, y)
        }
    }

    /// Moves the agent marker to `(x, y)` and returns the reward of the cell
    /// it lands on. Nothing is consumed, so revisiting a cell pays again.
    ///
    /// The position is updated even when it leaves the board; the marker then
    /// disappears and the Wall reward tells the caller to stop moving.
    pub fn move_agent(&mut self, x: isize, y: isize) -> f64 {
        let reward = self.rewards.reward(self.cell_at(x, y));
        self.agent = Pos::new(x, y);
        reward
    }

    pub fn iter_all_coordinates(&self) -> EnvIter {
        EnvIter::new(self.rows, self.cols)
    }

    pub fn render(&self) -> String {
        (0..self.rows as isize)
            .map(|x| {
                (0..self.cols as isize)
                    .map(|y| self.view_at(x, y).symbol().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct EnvIter {
    currx: usize,
    curry: usize,
    rows: usize,
    cols: usize,
}

impl EnvIter {
    fn new(rows: usize, cols: usize) -> EnvIter {
        EnvIter {
            currx: 0,
            curry: 0,
            rows,
            cols,
        }
    }
}

impl Iterator for EnvIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.cols == 0 || self.currx >= self.rows {
            return None;
        }
        let pos = Pos::new(self.currx as isize, self.curry as isize);
        self.curry += 1;
        if self.curry == self.cols {
            self.curry = 0;
            self.currx += 1;
        }
        Some(pos)
    }
}
