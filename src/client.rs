use crate::board::{Board, Coord};
use crate::error::GameError;
use crate::player::{PeerId, Player};
use crate::protocol::{Message, TableState};
use crate::tile::{self, Tile};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// What a participant's UI (or bot) needs to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    RosterChanged(Vec<Player>),
    PlayerLeft { name: String },
    GameStarted,
    /// This participant is on turn. Sent again with the same `turn_seq` when
    /// a mid-turn broadcast resets the preview.
    TurnStarted {
        turn_seq: u64,
        hand: Vec<Tile>,
        board: Board,
        has_made_initial_meld: bool,
    },
    /// This participant's turn is over; the turn timer should stop.
    TurnEnded,
    TableChanged {
        current_player: Option<PeerId>,
        tile_deck_count: usize,
    },
    BoardPreview(Board),
    TileDrawn(Tile),
    Rejected(String),
    GameOver { winner_name: String, won: bool },
    VoteTally { votes: usize, needed: usize },
    SessionEnded,
}

#[derive(Debug, Clone)]
struct TurnSnapshot {
    hand: Vec<Tile>,
    board: Board,
}

/// One participant's view of the room.
///
/// Confirmed state is whatever the host last broadcast. Preview state is what
/// this participant is building during their own turn. Every broadcast
/// replaces the preview with the confirmed values.
#[derive(Debug, Clone)]
pub struct ClientSession {
    my_id: PeerId,
    host_id: Option<PeerId>,
    players: Vec<Player>,
    confirmed: Option<TableState>,
    confirmed_hand: Vec<Tile>,
    preview_board: Board,
    preview_hand: Vec<Tile>,
    snapshot: Option<TurnSnapshot>,
    moves_made: bool,
    winner: Option<String>,
    votes: BTreeSet<PeerId>,
    voters_needed: usize,
}

impl ClientSession {
    pub fn new(my_id: impl Into<PeerId>) -> Self {
        Self {
            my_id: my_id.into(),
            host_id: None,
            players: Vec::new(),
            confirmed: None,
            confirmed_hand: Vec::new(),
            preview_board: Board::new(),
            preview_hand: Vec::new(),
            snapshot: None,
            moves_made: false,
            winner: None,
            votes: BTreeSet::new(),
            voters_needed: 0,
        }
    }

    pub fn my_id(&self) -> &PeerId {
        &self.my_id
    }

    pub fn host_id(&self) -> Option<&PeerId> {
        self.host_id.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn table(&self) -> Option<&TableState> {
        self.confirmed.as_ref()
    }

    pub fn hand(&self) -> &[Tile] {
        &self.preview_hand
    }

    pub fn board(&self) -> &Board {
        &self.preview_board
    }

    pub fn confirmed_hand(&self) -> &[Tile] {
        &self.confirmed_hand
    }

    pub fn moves_made(&self) -> bool {
        self.moves_made
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn has_made_initial_meld(&self) -> bool {
        self.confirmed
            .as_ref()
            .and_then(|t| t.player_states.get(&self.my_id))
            .is_some_and(|s| s.has_made_initial_meld)
    }

    pub fn is_my_turn(&self) -> bool {
        self.winner.is_none()
            && self
                .confirmed
                .as_ref()
                .and_then(TableState::current_player)
                .is_some_and(|id| *id == self.my_id)
    }

    fn ensure_my_turn(&self) -> Result<u64, GameError> {
        let table = self.confirmed.as_ref().ok_or(GameError::GameNotRunning)?;
        if self.winner.is_some() {
            return Err(GameError::GameNotRunning);
        }
        match table.current_player() {
            Some(id) if *id == self.my_id => Ok(table.turn_seq),
            Some(id) => Err(GameError::NotYourTurn {
                expected: id.clone(),
                got: self.my_id.clone(),
            }),
            None => Err(GameError::GameNotRunning),
        }
    }

    pub fn handle(&mut self, message: Message) -> Vec<ClientEvent> {
        debug!(me = %self.my_id, kind = message.kind(), "received");
        match message {
            Message::Welcome { players, host_id } => {
                self.players = players;
                self.host_id = Some(host_id);
                vec![ClientEvent::RosterChanged(self.players.clone())]
            }
            Message::PlayerJoined { player } => {
                if !self.players.iter().any(|p| p.id == player.id) {
                    self.players.push(player);
                }
                vec![ClientEvent::RosterChanged(self.players.clone())]
            }
            Message::PlayerLeft {
                player_id,
                player_name,
            } => {
                self.players.retain(|p| p.id != player_id);
                vec![
                    ClientEvent::PlayerLeft { name: player_name },
                    ClientEvent::RosterChanged(self.players.clone()),
                ]
            }
            Message::InitialState { table, hand } => {
                self.winner = None;
                self.votes.clear();
                self.confirmed = None;
                let mut events = vec![ClientEvent::GameStarted];
                events.extend(self.apply_confirmed(table, hand));
                events
            }
            Message::StateUpdate { table, hand } => self.apply_confirmed(table, hand),
            Message::BoardUpdate(board) => {
                if self.is_my_turn() {
                    return Vec::new();
                }
                self.preview_board = board.clone();
                vec![ClientEvent::BoardPreview(board)]
            }
            Message::TileDrawn { tile } => vec![ClientEvent::TileDrawn(tile)],
            Message::GameOver {
                winner_id,
                winner_name,
                board,
            } => {
                let mut events = Vec::new();
                if self.is_my_turn() {
                    events.push(ClientEvent::TurnEnded);
                }
                if let Some(table) = self.confirmed.as_mut() {
                    table.board_grid = board.clone();
                }
                self.preview_board = board;
                self.snapshot = None;
                self.moves_made = false;
                self.winner = Some(winner_name.clone());
                self.votes.clear();
                self.voters_needed = self.players.len();
                info!(me = %self.my_id, winner = %winner_name, "game over");
                events.push(ClientEvent::GameOver {
                    winner_name,
                    won: winner_id == self.my_id,
                });
                events
            }
            Message::PlayAgainVote { player_id } => {
                self.votes.insert(player_id);
                vec![ClientEvent::VoteTally {
                    votes: self.votes.len(),
                    needed: self.voters_needed,
                }]
            }
            Message::Error { message } => {
                warn!(me = %self.my_id, reason = %message, "host rejected request");
                vec![ClientEvent::Rejected(message)]
            }
            other => {
                warn!(me = %self.my_id, kind = other.kind(), "host-bound message ignored");
                Vec::new()
            }
        }
    }

    /// Replaces preview state with the host's confirmed state.
    fn apply_confirmed(&mut self, table: TableState, hand: Vec<Tile>) -> Vec<ClientEvent> {
        if self.confirmed.as_ref() == Some(&table) && self.confirmed_hand == hand {
            debug!(me = %self.my_id, "duplicate state ignored");
            return Vec::new();
        }
        let was_my_turn = self.is_my_turn();
        self.preview_board = table.board_grid.clone();
        self.preview_hand = hand.clone();
        self.confirmed_hand = hand;
        self.moves_made = false;
        self.snapshot = None;
        let mut events = vec![ClientEvent::TableChanged {
            current_player: table.current_player().cloned(),
            tile_deck_count: table.tile_deck_count,
        }];
        self.confirmed = Some(table);

        if self.is_my_turn() {
            self.snapshot = Some(TurnSnapshot {
                hand: self.preview_hand.clone(),
                board: self.preview_board.clone(),
            });
            events.push(ClientEvent::TurnStarted {
                turn_seq: self.confirmed.as_ref().map_or(0, |t| t.turn_seq),
                hand: self.preview_hand.clone(),
                board: self.preview_board.clone(),
                has_made_initial_meld: self.has_made_initial_meld(),
            });
        } else if was_my_turn {
            events.push(ClientEvent::TurnEnded);
        }
        events
    }

    fn sync(&self) -> Message {
        Message::BoardMoveRequest(self.preview_board.clone())
    }

    /// Moves a hand tile onto an empty cell.
    pub fn place_from_hand(&mut self, hand_index: usize, at: Coord) -> Result<Message, GameError> {
        self.ensure_my_turn()?;
        let tile = *self
            .preview_hand
            .get(hand_index)
            .ok_or(GameError::NoSuchHandTile(hand_index))?;
        self.preview_board.place(at, tile)?;
        self.preview_hand.remove(hand_index);
        self.moves_made = true;
        Ok(self.sync())
    }

    pub fn move_tile(&mut self, from: Coord, to: Coord) -> Result<Message, GameError> {
        self.ensure_my_turn()?;
        self.preview_board.relocate(from, to)?;
        self.moves_made = true;
        Ok(self.sync())
    }

    /// Takes a tile back; only tiles laid this turn may return to the hand.
    pub fn return_to_hand(&mut self, at: Coord) -> Result<Message, GameError> {
        self.ensure_my_turn()?;
        let snapshot = self.snapshot.as_ref().ok_or(GameError::GameNotRunning)?;
        let mut remaining = self.preview_board.clone();
        let tile = remaining.take(at)?;
        if !tile::contains_all(&remaining.tiles(), &snapshot.board.tiles()) {
            return Err(GameError::TileLocked);
        }
        self.moves_made = remaining != snapshot.board;
        self.preview_board = remaining;
        self.preview_hand.push(tile);
        Ok(self.sync())
    }

    /// Discards every change since the turn started.
    pub fn undo(&mut self) -> Result<Message, GameError> {
        self.ensure_my_turn()?;
        let snapshot = self.snapshot.as_ref().ok_or(GameError::GameNotRunning)?;
        self.preview_hand = snapshot.hand.clone();
        self.preview_board = snapshot.board.clone();
        self.moves_made = false;
        Ok(self.sync())
    }

    fn placed_this_turn(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| !self.preview_board.diff(&s.board).added.is_empty())
    }

    /// Builds the turn-ending request: a draw when nothing was laid down,
    /// otherwise the board for the host to validate.
    pub fn end_turn(&mut self) -> Result<Message, GameError> {
        let turn_seq = self.ensure_my_turn()?;
        if !self.placed_this_turn() {
            return Ok(Message::DrawTileRequest { turn_seq });
        }
        if !self.preview_board.is_valid() {
            return Err(GameError::InvalidBoard);
        }
        Ok(Message::EndTurnRequest {
            turn_seq,
            board: self.preview_board.clone(),
        })
    }

    /// Called when the turn timer runs out.
    ///
    /// A valid board with new tiles is submitted as is. Otherwise the turn is
    /// rolled back and ends with a draw.
    pub fn on_turn_timeout(&mut self) -> Vec<Message> {
        let Ok(turn_seq) = self.ensure_my_turn() else {
            return Vec::new();
        };
        info!(me = %self.my_id, turn_seq, "turn timed out");
        if self.placed_this_turn() && self.preview_board.is_valid() {
            return vec![Message::EndTurnRequest {
                turn_seq,
                board: self.preview_board.clone(),
            }];
        }
        let mut out = Vec::new();
        if self.moves_made {
            if let Ok(sync) = self.undo() {
                out.push(sync);
            }
        }
        out.push(Message::DrawTileRequest { turn_seq });
        out
    }

    pub fn vote_play_again(&self) -> Result<Message, GameError> {
        if self.winner.is_none() {
            return Err(GameError::GameNotRunning);
        }
        Ok(Message::PlayAgainVote {
            player_id: self.my_id.clone(),
        })
    }

    /// Explicit leave: forget everything about the room.
    pub fn leave(&mut self) {
        info!(me = %self.my_id, "leaving room");
        *self = Self::new(self.my_id.clone());
    }

    /// The host link closed. There is no failover, so the session is over.
    pub fn on_host_closed(&mut self) -> Vec<ClientEvent> {
        warn!(me = %self.my_id, "host connection lost");
        self.leave();
        vec![ClientEvent::SessionEnded]
    }
}
