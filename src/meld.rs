use crate::tile::{Color, MAX_NUMBER, Tile};
use std::collections::HashSet;

pub const MIN_MELD_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeldKind {
    Group,
    Run,
}

/// Decides whether `tiles` form a legal group or run.
///
/// Fewer than three tiles never form a meld. With at most one non-joker tile
/// there is not enough information to reject, so the meld is accepted.
pub fn is_valid_meld(tiles: &[Tile]) -> bool {
    classify(tiles).is_some()
}

/// Like [`is_valid_meld`] but reports which shape matched. Groups win ties.
pub fn classify(tiles: &[Tile]) -> Option<MeldKind> {
    if tiles.len() < MIN_MELD_LEN {
        return None;
    }
    let mut rest: Vec<Tile> = tiles.iter().filter(|t| !t.is_joker()).copied().collect();
    let jokers = tiles.len() - rest.len();

    if rest.len() <= 1 {
        return Some(MeldKind::Group);
    }
    rest.sort_by_key(|t| t.number);

    if is_group(&rest, jokers) {
        Some(MeldKind::Group)
    } else if is_run(&rest, jokers) {
        Some(MeldKind::Run)
    } else {
        None
    }
}

/// Same number, pairwise distinct colors, jokers filling the missing colors.
fn is_group(rest: &[Tile], jokers: usize) -> bool {
    let number = rest[0].number;
    let mut remaining: HashSet<Color> = Color::SUITS.into_iter().collect();
    for tile in rest {
        if tile.number != number || !remaining.remove(&tile.color) {
            return false;
        }
    }
    jokers <= remaining.len()
}

/// Same color, strictly increasing numbers, gaps covered by jokers.
fn is_run(rest: &[Tile], jokers: usize) -> bool {
    let color = rest[0].color;
    if rest.len() + jokers > MAX_NUMBER as usize {
        return false;
    }
    let mut used = 0usize;
    for pair in rest.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.color != color || next.number <= prev.number {
            return false;
        }
        used += (next.number - prev.number - 1) as usize;
        if used > jokers {
            return false;
        }
    }
    true
}

/// Sum of face values; jokers contribute nothing.
pub fn meld_value(tiles: &[Tile]) -> u32 {
    tiles.iter().map(Tile::value).sum()
}
