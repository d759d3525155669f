use crate::tile::{Color, MAX_NUMBER, MIN_NUMBER, Tile};
use rand::Rng;
use rand::seq::SliceRandom;

/// Number of complete color/number sets in a deck.
const SETS: usize = 2;
const JOKERS: usize = 2;

#[derive(Debug, Clone)]
pub struct Deck {
    tiles: Vec<Tile>,
}

impl Deck {
    /// Two full 4x13 sets followed by the jokers, unshuffled.
    pub fn standard() -> Self {
        let mut tiles = Vec::with_capacity(SETS * 4 * MAX_NUMBER as usize + JOKERS);
        for _ in 0..SETS {
            for &color in &Color::SUITS {
                for number in MIN_NUMBER..=MAX_NUMBER {
                    tiles.push(Tile::new(color, number));
                }
            }
        }
        for _ in 0..JOKERS {
            tiles.push(Tile::joker());
        }
        Self { tiles }
    }

    /// A deck in exactly the given order; draws come off the end.
    pub fn from_tiles(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn new_shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::standard();
        deck.tiles.shuffle(rng);
        deck
    }

    /// Takes `count` tiles from the front of the deck.
    pub fn deal(&mut self, count: usize) -> Vec<Tile> {
        let count = count.min(self.tiles.len());
        self.tiles.drain(..count).collect()
    }

    /// Draws from the tail; an empty deck yields nothing.
    pub fn draw(&mut self) -> Option<Tile> {
        self.tiles.pop()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
