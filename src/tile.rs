use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Orange,
    Black,
    Joker,
}

impl Color {
    /// The four suit colors, jokers excluded.
    pub const SUITS: [Color; 4] = [Color::Red, Color::Blue, Color::Orange, Color::Black];
}

pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 13;

/// A tile carries no identity beyond its color/number pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    pub color: Color,
    pub number: u8,
}

impl Tile {
    pub fn new(color: Color, number: u8) -> Self {
        Self { color, number }
    }

    pub fn joker() -> Self {
        Self { color: Color::Joker, number: 0 }
    }

    pub fn is_joker(&self) -> bool {
        self.color == Color::Joker
    }

    /// Face value used for scoring; jokers count as zero.
    pub fn value(&self) -> u32 {
        if self.is_joker() { 0 } else { self.number as u32 }
    }

    /// Rejects tiles that could not have come out of a deck.
    pub fn is_well_formed(&self) -> bool {
        match self.color {
            Color::Joker => self.number == 0,
            _ => (MIN_NUMBER..=MAX_NUMBER).contains(&self.number),
        }
    }
}

fn counts(tiles: &[Tile]) -> HashMap<Tile, usize> {
    let mut counts = HashMap::new();
    for tile in tiles {
        *counts.entry(*tile).or_insert(0) += 1;
    }
    counts
}

/// Multiset difference `from - remove`, sorted.
pub fn difference(from: &[Tile], remove: &[Tile]) -> Vec<Tile> {
    let mut remaining = counts(remove);
    let mut out = Vec::new();
    for tile in from {
        match remaining.get_mut(tile) {
            Some(n) if *n > 0 => *n -= 1,
            _ => out.push(*tile),
        }
    }
    out.sort();
    out
}

/// True if every tile of `needle` (with multiplicity) is present in `haystack`.
pub fn contains_all(haystack: &[Tile], needle: &[Tile]) -> bool {
    let available = counts(haystack);
    counts(needle)
        .iter()
        .all(|(tile, n)| available.get(tile).copied().unwrap_or(0) >= *n)
}

/// Removes one copy of each tile in `taken` from `hand`. Returns false and leaves
/// the hand untouched if any tile is missing.
pub fn remove_all(hand: &mut Vec<Tile>, taken: &[Tile]) -> bool {
    if !contains_all(hand, taken) {
        return false;
    }
    for tile in taken {
        if let Some(pos) = hand.iter().position(|t| t == tile) {
            hand.swap_remove(pos);
        }
    }
    true
}
