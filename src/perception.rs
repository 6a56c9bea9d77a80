use ndarray::Array1;

use crate::environment::{Cell, Direction, GridWorld, Pos};

/// Width of one sensed cell's one-hot block.
pub const BLOCK_WIDTH: usize = 4;

/// Category order inside a block.
pub const CATEGORIES: [Cell; BLOCK_WIDTH] = [Cell::Empty, Cell::Wall, Cell::Food, Cell::Poison];

// The agent never senses its own cell, so a marker reads as Empty.
fn category(cell: Cell) -> usize {
    CATEGORIES.iter().position(|c| *c == cell).unwrap_or(0)
}

/// What the agent sees from one position and facing.
#[derive(Debug, Clone, PartialEq)]
pub struct Perception {
    /// Concatenated one-hot blocks, front group then left then right,
    /// nearest first within each group.
    pub features: Array1<f64>,
    /// Absolute directions of front, left and right.
    pub directions: [Direction; 3],
    /// Cells one step away in front, left and right.
    pub primary: [Cell; 3],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PerceptionModel {
    depth: usize,
}

impl PerceptionModel {
    /// Front, left and right neighbours only.
    pub fn basic() -> Self {
        Self { depth: 1 }
    }

    /// Three cells deep in each of front, left and right.
    pub fn extended() -> Self {
        Self { depth: 3 }
    }

    pub fn sensed_cells(&self) -> usize {
        3 * self.depth
    }

    pub fn feature_len(&self) -> usize {
        BLOCK_WIDTH * self.sensed_cells()
    }

    pub fn offsets(&self, pos: Pos, facing: Direction) -> Vec<Pos> {
        let groups = [facing, facing.left(), facing.right()];
        groups.iter()
            .flat_map(|&direction| (1..=self.depth as isize).map(move |d| pos.offset(direction, d)))
            .collect()
    }

    pub fn perceive(&self, world: &GridWorld, pos: Pos, facing: Direction) -> Perception {
        let mut features = Array1::<f64>::zeros(self.feature_len());
        for (block, sensed) in self.offsets(pos, facing).into_iter().enumerate() {
            let cell = world.cell_at(sensed.x, sensed.y);
            features[block * BLOCK_WIDTH + category(cell)] = 1.0;
        }

        let directions = [facing, facing.left(), facing.right()];
        let mut primary = [Cell::Empty; 3];
        for (slot, direction) in directions.iter().enumerate() {
            let near = pos.offset(*direction, 1);
            primary[slot] = world.cell_at(near.x, near.y);
        }

        Perception { features, directions, primary }
    }
}
