use serde::{Deserialize, Serialize};

/// Transport-level identifier of a participant.
pub type PeerId = String;

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PeerId,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<PeerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Public per-player game state, mutated only by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub has_made_initial_meld: bool,
    pub hand_size: usize,
}

impl PlayerState {
    pub fn new(hand_size: usize) -> Self {
        Self {
            has_made_initial_meld: false,
            hand_size,
        }
    }
}

/// Display name for a player joining without a nickname.
pub fn default_name(seat: usize) -> String {
    format!("Player {}", seat)
}
