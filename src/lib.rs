//! Host-authoritative peer-to-peer Rummikub.
//!
//! One participant hosts and owns the deck, hands, board and turn order. Guests
//! send requests; the host validates each one and broadcasts the canonical
//! state, feeding its own client through the same path.

pub mod board;
pub mod bot;
pub mod client;
pub mod config;
pub mod deck;
pub mod error;
pub mod game;
pub mod host;
pub mod meld;
pub mod network;
pub mod player;
pub mod protocol;
pub mod runtime;
pub mod tile;

pub use board::{Board, Coord};
pub use client::{ClientEvent, ClientSession};
pub use error::{GameError, TransportError};
pub use game::{Game, Rules, TurnOutcome};
pub use host::{Envelope, HostSession, Recipient};
pub use player::{PeerId, Player, PlayerState};
pub use protocol::{Message, TableState};
pub use tile::{Color, Tile};
