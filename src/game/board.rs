use serde::{Deserialize, Serialize};

use crate::protocol::{GameError, PieceInventory, PieceSize, PlayerColor, BOARD_CELLS};

/// One cell of the board. The three size slots are independent: different
/// sizes may carry different colors, but each slot holds at most one piece.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    #[serde(rename = "P")]
    pub small: Option<PlayerColor>,
    #[serde(rename = "M")]
    pub medium: Option<PlayerColor>,
    #[serde(rename = "G")]
    pub large: Option<PlayerColor>,
}

impl Cell {
    pub const fn slot(&self, size: PieceSize) -> Option<PlayerColor> {
        match size {
            PieceSize::Small => self.small,
            PieceSize::Medium => self.medium,
            PieceSize::Large => self.large,
        }
    }

    fn slot_mut(&mut self, size: PieceSize) -> &mut Option<PlayerColor> {
        match size {
            PieceSize::Small => &mut self.small,
            PieceSize::Medium => &mut self.medium,
            PieceSize::Large => &mut self.large,
        }
    }

    /// The color that shows on top of this cell: the largest occupied slot.
    /// Only visible pieces count toward win detection.
    pub const fn visible(&self) -> Option<PlayerColor> {
        match (self.large, self.medium, self.small) {
            (Some(c), _, _) => Some(c),
            (None, Some(c), _) => Some(c),
            (None, None, c) => c,
        }
    }
}

/// The 8 alignments of a 3x3 grid: rows, columns, diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// 3x3 board, row-major cells 0..=8.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub cells: [Cell; BOARD_CELLS],
}

impl Board {
    /// A move is legal iff the cell index is in range and the target size
    /// slot is empty. Colors are never checked here: sizes stack freely.
    pub fn is_legal(&self, cell: usize, size: PieceSize) -> bool {
        self.cells
            .get(cell)
            .is_some_and(|c| c.slot(size).is_none())
    }

    /// Returns the board with the piece placed, leaving `self` untouched.
    pub fn with_move(
        &self,
        cell: usize,
        size: PieceSize,
        color: PlayerColor,
    ) -> Result<Board, GameError> {
        if cell >= BOARD_CELLS {
            return Err(GameError::InvalidInput(format!(
                "cell index must be 0..={} (got {cell})",
                BOARD_CELLS - 1
            )));
        }
        let mut next = *self;
        let slot = next.cells[cell].slot_mut(size);
        if slot.is_some() {
            return Err(GameError::SlotOccupied { cell, size });
        }
        *slot = Some(color);
        Ok(next)
    }

    pub fn visible(&self, cell: usize) -> Option<PlayerColor> {
        self.cells.get(cell).and_then(Cell::visible)
    }

    /// True iff some line shows `color` on all three cells. Nested and
    /// size-ordered alignments win only through their visible projection.
    pub fn has_win(&self, color: PlayerColor) -> bool {
        LINES
            .iter()
            .any(|line| line.iter().all(|&idx| self.visible(idx) == Some(color)))
    }

    /// True iff the inventory can place at least one piece somewhere.
    pub fn any_legal_move(&self, inventory: &PieceInventory) -> bool {
        PieceSize::ALL.iter().any(|&size| {
            inventory.count(size) > 0 && self.cells.iter().any(|c| c.slot(size).is_none())
        })
    }

    /// Number of pieces of `color` and `size` currently placed.
    pub fn count_pieces(&self, color: PlayerColor, size: PieceSize) -> usize {
        self.cells
            .iter()
            .filter(|c| c.slot(size) == Some(color))
            .count()
    }
}
