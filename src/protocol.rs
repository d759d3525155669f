use crate::board::Board;
use crate::error::TransportError;
use crate::player::{PeerId, Player, PlayerState};
use crate::tile::Tile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical table state as broadcast by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    pub turn_order: Vec<PeerId>,
    pub current_turn_index: usize,
    /// Monotonic turn counter; requests echo it back.
    pub turn_seq: u64,
    pub board_grid: Board,
    pub player_states: BTreeMap<PeerId, PlayerState>,
    pub tile_deck_count: usize,
}

impl TableState {
    pub fn current_player(&self) -> Option<&PeerId> {
        self.turn_order.get(self.current_turn_index)
    }
}

/// Every message exchanged between host and guests. Serialized as
/// `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    // lobby
    Welcome {
        players: Vec<Player>,
        host_id: PeerId,
    },
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player_id: PeerId,
        player_name: String,
    },

    // round start, one per recipient carrying that recipient's hand
    InitialState {
        table: TableState,
        hand: Vec<Tile>,
    },

    // live preview while a turn is in progress
    BoardUpdate(Board),
    BoardMoveRequest(Board),

    // turn transitions, stamped with the `turn_seq` they were issued in
    EndTurnRequest {
        turn_seq: u64,
        board: Board,
    },
    DrawTileRequest {
        turn_seq: u64,
    },
    StateUpdate {
        table: TableState,
        hand: Vec<Tile>,
    },
    TileDrawn {
        tile: Tile,
    },

    GameOver {
        winner_id: PeerId,
        winner_name: String,
        board: Board,
    },
    PlayAgainVote {
        player_id: PeerId,
    },
    Error {
        message: String,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Welcome { .. } => "welcome",
            Message::PlayerJoined { .. } => "player_joined",
            Message::PlayerLeft { .. } => "player_left",
            Message::InitialState { .. } => "initial_state",
            Message::BoardUpdate(_) => "board_update",
            Message::BoardMoveRequest(_) => "board_move_request",
            Message::EndTurnRequest { .. } => "end_turn_request",
            Message::DrawTileRequest { .. } => "draw_tile_request",
            Message::StateUpdate { .. } => "state_update",
            Message::TileDrawn { .. } => "tile_drawn",
            Message::GameOver { .. } => "game_over",
            Message::PlayAgainVote { .. } => "play_again_vote",
            Message::Error { .. } => "error",
        }
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(raw)?)
    }
}
