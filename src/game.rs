use crate::board::Board;
use crate::deck::Deck;
use crate::error::GameError;
use crate::meld::meld_value;
use crate::player::{PeerId, PlayerState};
use crate::protocol::TableState;
use crate::tile::{self, Tile};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    pub min_players: usize,
    pub max_players: usize,
    pub tiles_per_player: usize,
    pub initial_meld_minimum: u32,
    pub turn_timeout: Duration,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 4,
            tiles_per_player: 14,
            initial_meld_minimum: 30,
            turn_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of an accepted turn-ending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Tiles were laid down and the turn passed on.
    Played {
        next_turn_index: usize,
        placed: Vec<Tile>,
        initial_meld: bool,
    },
    /// No tiles were laid down; the player drew (if the deck had any) and the
    /// turn passed on.
    Drew {
        next_turn_index: usize,
        tile: Option<Tile>,
    },
    /// The player emptied their hand. No further turns happen.
    Won { winner: PeerId },
}

/// Authoritative round state. Only the host holds one of these.
#[derive(Debug, Clone)]
pub struct Game {
    rules: Rules,
    deck: Deck,
    board: Board,
    preview: Board,
    turn_order: Vec<PeerId>,
    current_turn_index: usize,
    turn_seq: u64,
    player_states: BTreeMap<PeerId, PlayerState>,
    hands: HashMap<PeerId, Vec<Tile>>,
    winner: Option<PeerId>,
}

impl Game {
    /// Shuffles a fresh deck and the turn order, then deals each player in
    /// roster order from the front of the deck.
    pub fn start<R: Rng + ?Sized>(
        players: &[PeerId],
        rules: Rules,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let mut deck = Deck::new_shuffled(rng);
        let mut turn_order = players.to_vec();
        turn_order.shuffle(rng);
        let hands = players
            .iter()
            .map(|id| (id.clone(), deck.deal(rules.tiles_per_player)))
            .collect();
        Self::from_hands(rules, deck, turn_order, hands)
    }

    /// Builds a round from explicit hands and turn order.
    pub fn from_hands(
        rules: Rules,
        deck: Deck,
        turn_order: Vec<PeerId>,
        hands: Vec<(PeerId, Vec<Tile>)>,
    ) -> Result<Self, GameError> {
        if turn_order.len() < rules.min_players {
            return Err(GameError::NotEnoughPlayers {
                required: rules.min_players,
            });
        }
        if turn_order.len() > rules.max_players {
            return Err(GameError::RoomFull);
        }
        let hands: HashMap<PeerId, Vec<Tile>> = hands.into_iter().collect();
        if let Some(missing) = turn_order.iter().find(|id| !hands.contains_key(*id)) {
            return Err(GameError::UnknownPlayer(missing.clone()));
        }
        let player_states = hands
            .iter()
            .map(|(id, hand)| (id.clone(), PlayerState::new(hand.len())))
            .collect();
        Ok(Self {
            rules,
            deck,
            board: Board::new(),
            preview: Board::new(),
            turn_order,
            current_turn_index: 0,
            turn_seq: 0,
            player_states,
            hands,
            winner: None,
        })
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Uncommitted board the current player is building.
    pub fn preview(&self) -> &Board {
        &self.preview
    }

    pub fn turn_order(&self) -> &[PeerId] {
        &self.turn_order
    }

    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    pub fn current_player(&self) -> Option<&PeerId> {
        self.turn_order.get(self.current_turn_index)
    }

    /// Counts turns since the round began. Unlike the turn index it never
    /// repeats, so requests stamped with it cannot be replayed into a later
    /// turn.
    pub fn turn_seq(&self) -> u64 {
        self.turn_seq
    }

    /// Continues turn numbering from an earlier round so its late requests
    /// stay stale.
    pub fn starting_at_turn(mut self, turn_seq: u64) -> Self {
        self.turn_seq = turn_seq;
        self
    }

    pub fn hand(&self, id: &str) -> Option<&[Tile]> {
        self.hands.get(id).map(Vec::as_slice)
    }

    pub fn player_state(&self, id: &str) -> Option<&PlayerState> {
        self.player_states.get(id)
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn winner(&self) -> Option<&PeerId> {
        self.winner.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn table_state(&self) -> TableState {
        TableState {
            turn_order: self.turn_order.clone(),
            current_turn_index: self.current_turn_index,
            turn_seq: self.turn_seq,
            board_grid: self.board.clone(),
            player_states: self.player_states.clone(),
            tile_deck_count: self.deck.len(),
        }
    }

    fn check_turn(&self, player: &str, turn_seq: u64) -> Result<(), GameError> {
        if self.is_over() {
            return Err(GameError::GameNotRunning);
        }
        if turn_seq != self.turn_seq {
            return Err(GameError::StaleTurn {
                expected: self.turn_seq,
                got: turn_seq,
            });
        }
        match self.current_player() {
            Some(current) if current == player => Ok(()),
            Some(current) => Err(GameError::NotYourTurn {
                expected: current.clone(),
                got: player.to_string(),
            }),
            None => Err(GameError::GameNotRunning),
        }
    }

    /// Validates and commits a submitted board.
    ///
    /// Checks run in order: turn ownership, board shape, tile provenance,
    /// initial meld value. Any failure leaves the game untouched.
    pub fn end_turn(
        &mut self,
        player: &str,
        turn_seq: u64,
        board: Board,
    ) -> Result<TurnOutcome, GameError> {
        self.check_turn(player, turn_seq)?;
        if !board.iter().all(|(_, t)| t.is_well_formed()) {
            return Err(GameError::MalformedTile);
        }
        if !board.is_valid() {
            return Err(GameError::InvalidBoard);
        }

        let diff = board.diff(&self.board);
        if !diff.removed.is_empty() {
            return Err(GameError::BoardTilesRemoved);
        }
        if diff.added.is_empty() {
            return self.draw(player, turn_seq);
        }

        let hand = self
            .hands
            .get(player)
            .ok_or_else(|| GameError::UnknownPlayer(player.to_string()))?;
        if !tile::contains_all(hand, &diff.added) {
            return Err(GameError::TilesNotInHand);
        }
        let state = self
            .player_states
            .get(player)
            .copied()
            .ok_or_else(|| GameError::UnknownPlayer(player.to_string()))?;
        let initial_meld = !state.has_made_initial_meld;
        if initial_meld {
            let sum = meld_value(&diff.added);
            if sum < self.rules.initial_meld_minimum {
                return Err(GameError::InitialMeldTooLow {
                    sum,
                    required: self.rules.initial_meld_minimum,
                });
            }
        }

        let hand = self
            .hands
            .get_mut(player)
            .ok_or_else(|| GameError::UnknownPlayer(player.to_string()))?;
        tile::remove_all(hand, &diff.added);
        let remaining = hand.len();
        if let Some(state) = self.player_states.get_mut(player) {
            state.has_made_initial_meld = true;
            state.hand_size = remaining;
        }
        self.preview = board.clone();
        self.board = board;

        if remaining == 0 {
            self.winner = Some(player.to_string());
            return Ok(TurnOutcome::Won {
                winner: player.to_string(),
            });
        }
        Ok(TurnOutcome::Played {
            next_turn_index: self.advance(),
            placed: diff.added,
            initial_meld,
        })
    }

    /// Ends the turn without laying tiles: draw one from the tail if any remain.
    pub fn draw(&mut self, player: &str, turn_seq: u64) -> Result<TurnOutcome, GameError> {
        self.check_turn(player, turn_seq)?;
        let tile = self.deck.draw();
        if let Some(tile) = tile {
            if let Some(hand) = self.hands.get_mut(player) {
                hand.push(tile);
                if let Some(state) = self.player_states.get_mut(player) {
                    state.hand_size = hand.len();
                }
            }
        }
        self.preview = self.board.clone();
        Ok(TurnOutcome::Drew {
            next_turn_index: self.advance(),
            tile,
        })
    }

    /// Records the current player's in-progress board. Never committed.
    pub fn set_preview(&mut self, player: &str, board: Board) -> Result<(), GameError> {
        if self.is_over() {
            return Err(GameError::GameNotRunning);
        }
        match self.current_player() {
            Some(current) if current == player => {
                self.preview = board;
                Ok(())
            }
            Some(current) => Err(GameError::NotYourTurn {
                expected: current.clone(),
                got: player.to_string(),
            }),
            None => Err(GameError::GameNotRunning),
        }
    }

    fn advance(&mut self) -> usize {
        self.current_turn_index = (self.current_turn_index + 1) % self.turn_order.len();
        self.turn_seq += 1;
        self.current_turn_index
    }

    /// Drops a departed player from the turn order.
    ///
    /// The player who would have moved next keeps that position. If the
    /// departed player was on turn, their uncommitted preview is discarded and
    /// the turn passes on. Returns the winner if only one player is left.
    pub fn remove_player(&mut self, id: &str) -> Option<PeerId> {
        let pos = self.turn_order.iter().position(|p| p == id)?;
        self.turn_order.remove(pos);
        self.hands.remove(id);
        self.player_states.remove(id);
        if self.turn_order.is_empty() {
            return None;
        }

        if pos < self.current_turn_index {
            self.current_turn_index -= 1;
        } else if pos == self.current_turn_index {
            self.preview = self.board.clone();
            self.turn_seq += 1;
            if self.current_turn_index >= self.turn_order.len() {
                self.current_turn_index = 0;
            }
        }

        if self.winner.is_none() && self.turn_order.len() == 1 {
            self.winner = Some(self.turn_order[0].clone());
            return self.winner.clone();
        }
        None
    }
}
