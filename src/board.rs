use crate::error::GameError;
use crate::meld::is_valid_meld;
use crate::tile::{self, Tile};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// A cell on the board. Ordered row-major (by `y`, then `x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn left(self) -> Option<Self> {
        Some(Self { x: self.x.checked_sub(1)?, ..self })
    }

    fn right(self) -> Option<Self> {
        Some(Self { x: self.x.checked_add(1)?, ..self })
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then_with(|| self.x.cmp(&other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One occupied cell in the wire form of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEntry {
    pub x: i32,
    pub y: i32,
    pub tile: Tile,
}

/// Sparse grid of tiles. Absence of a key means an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BoardEntry>", into = "Vec<BoardEntry>")]
pub struct Board {
    cells: BTreeMap<Coord, Tile>,
}

/// Tiles gained and lost relative to an earlier board, as multisets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardDiff {
    pub added: Vec<Tile>,
    pub removed: Vec<Tile>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, at: Coord) -> Option<Tile> {
        self.cells.get(&at).copied()
    }

    pub fn contains(&self, at: Coord) -> bool {
        self.cells.contains_key(&at)
    }

    pub fn place(&mut self, at: Coord, tile: Tile) -> Result<(), GameError> {
        if self.cells.contains_key(&at) {
            return Err(GameError::CellOccupied { x: at.x, y: at.y });
        }
        self.cells.insert(at, tile);
        Ok(())
    }

    pub fn take(&mut self, at: Coord) -> Result<Tile, GameError> {
        self.cells
            .remove(&at)
            .ok_or(GameError::EmptyCell { x: at.x, y: at.y })
    }

    /// Moves a tile between cells; the target must be empty.
    pub fn relocate(&mut self, from: Coord, to: Coord) -> Result<(), GameError> {
        if from == to {
            return Ok(());
        }
        if self.cells.contains_key(&to) {
            return Err(GameError::CellOccupied { x: to.x, y: to.y });
        }
        let tile = self.take(from)?;
        self.cells.insert(to, tile);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, Tile)> + '_ {
        self.cells.iter().map(|(c, t)| (*c, *t))
    }

    pub fn tiles(&self) -> Vec<Tile> {
        self.cells.values().copied().collect()
    }

    /// Lowest free row below every occupied cell, with one blank row between.
    pub fn next_free_row(&self) -> i32 {
        self.cells.keys().map(|c| c.y.saturating_add(2)).max().unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<BoardEntry> {
        self.iter()
            .map(|(c, tile)| BoardEntry { x: c.x, y: c.y, tile })
            .collect()
    }

    pub fn from_entries(entries: Vec<BoardEntry>) -> Result<Self, GameError> {
        let mut board = Board::new();
        for entry in entries {
            let at = Coord::new(entry.x, entry.y);
            if board.cells.insert(at, entry.tile).is_some() {
                return Err(GameError::DuplicateCoordinate { x: at.x, y: at.y });
            }
        }
        Ok(board)
    }

    /// Multiset change from `before` to `self`; positions are ignored.
    pub fn diff(&self, before: &Board) -> BoardDiff {
        let now = self.tiles();
        let then = before.tiles();
        BoardDiff {
            added: tile::difference(&now, &then),
            removed: tile::difference(&then, &now),
        }
    }

    pub fn components(&self) -> Vec<Vec<Tile>> {
        find_connected_components(self)
    }

    pub fn is_valid(&self) -> bool {
        is_board_valid(self)
    }
}

impl TryFrom<Vec<BoardEntry>> for Board {
    type Error = GameError;

    fn try_from(entries: Vec<BoardEntry>) -> Result<Self, Self::Error> {
        Board::from_entries(entries)
    }
}

impl From<Board> for Vec<BoardEntry> {
    fn from(board: Board) -> Self {
        board.entries()
    }
}

impl FromIterator<(Coord, Tile)> for Board {
    fn from_iter<I: IntoIterator<Item = (Coord, Tile)>>(iter: I) -> Self {
        Self { cells: iter.into_iter().collect() }
    }
}

/// Splits the board into maximal horizontal runs of occupied cells.
///
/// Only left/right neighbours connect; rows are independent meld lanes and
/// the grid does not wrap at the edges of the coordinate range.
/// Components come out in row-major order of their first cell, tiles within a
/// component in the order the traversal reached them.
pub fn find_connected_components(board: &Board) -> Vec<Vec<Tile>> {
    let mut components = Vec::new();
    let mut visited: HashSet<Coord> = HashSet::new();

    for &start in board.cells.keys() {
        if !visited.insert(start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            component.push(board.cells[&current]);
            for next in [current.right(), current.left()].into_iter().flatten() {
                if board.cells.contains_key(&next) && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Every component must be a legal meld. Components shorter than a meld fail
/// through the validator's own length check.
pub fn is_board_valid(board: &Board) -> bool {
    board.is_empty() || find_connected_components(board).iter().all(|c| is_valid_meld(c))
}
