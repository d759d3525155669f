use crate::board::Board;
use crate::error::GameError;
use crate::game::{Game, Rules, TurnOutcome};
use crate::player::{PeerId, Player, default_name};
use crate::protocol::Message;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Who an outbound message is for. `All` includes the host's own client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Peer(PeerId),
    All,
    AllExcept(PeerId),
}

impl Recipient {
    pub fn includes(&self, peer: &str) -> bool {
        match self {
            Recipient::Peer(id) => id == peer,
            Recipient::All => true,
            Recipient::AllExcept(id) => id != peer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: Recipient,
    pub message: Message,
}

impl Envelope {
    pub fn to_peer(peer: impl Into<PeerId>, message: Message) -> Self {
        Self {
            to: Recipient::Peer(peer.into()),
            message,
        }
    }

    pub fn to_all(message: Message) -> Self {
        Self {
            to: Recipient::All,
            message,
        }
    }

    pub fn to_all_except(peer: impl Into<PeerId>, message: Message) -> Self {
        Self {
            to: Recipient::AllExcept(peer.into()),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Playing,
    GameOver,
}

/// The authoritative side of a room.
///
/// Every inbound request goes through [`HostSession::handle`], which either
/// rejects it (leaving state untouched) or commits and returns the messages to
/// fan out. The host's own client is addressed like any other peer.
pub struct HostSession {
    host_id: PeerId,
    rules: Rules,
    rng: StdRng,
    players: Vec<Player>,
    game: Option<Game>,
    votes: BTreeSet<PeerId>,
    voters_needed: usize,
}

impl HostSession {
    /// Creates a room with the host as its only member. The returned envelope
    /// seeds the host's own client.
    pub fn create_room(host: Player, rules: Rules, seed: Option<u64>) -> (Self, Vec<Envelope>) {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(host = %host.id, name = %host.name, "room created");
        let session = Self {
            host_id: host.id.clone(),
            rules,
            rng,
            players: vec![host],
            game: None,
            votes: BTreeSet::new(),
            voters_needed: 0,
        };
        let welcome = session.welcome_for(&session.host_id);
        (session, vec![welcome])
    }

    pub fn host_id(&self) -> &PeerId {
        &self.host_id
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn phase(&self) -> Phase {
        match &self.game {
            None => Phase::Lobby,
            Some(game) if game.is_over() => Phase::GameOver,
            Some(_) => Phase::Playing,
        }
    }

    fn player_name(&self, id: &str) -> String {
        self.players
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn welcome_for(&self, peer: &str) -> Envelope {
        Envelope::to_peer(
            peer,
            Message::Welcome {
                players: self.players.clone(),
                host_id: self.host_id.clone(),
            },
        )
    }

    /// Admits a newly opened link. On error the caller tells the peer why and
    /// closes the link.
    pub fn join(&mut self, peer: PeerId, nickname: Option<String>) -> Result<Vec<Envelope>, GameError> {
        if self.players.len() >= self.rules.max_players {
            warn!(peer = %peer, "join refused, room full");
            return Err(GameError::RoomFull);
        }
        if self.game.is_some() {
            warn!(peer = %peer, "join refused, game in progress");
            return Err(GameError::GameInProgress);
        }
        if self.players.iter().any(|p| p.id == peer) {
            warn!(peer = %peer, "join refused, id already seated");
            return Err(GameError::PeerIdTaken(peer));
        }

        let name = nickname
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(self.players.len() + 1));
        let player = Player::new(peer.clone(), name);
        info!(peer = %peer, name = %player.name, "player joined");
        self.players.push(player.clone());

        Ok(vec![
            self.welcome_for(&peer),
            Envelope::to_all_except(peer, Message::PlayerJoined { player }),
        ])
    }

    /// Handles a closed link. Survivors keep playing with the departed player
    /// pruned from the turn order.
    pub fn leave(&mut self, peer: &str) -> Vec<Envelope> {
        let Some(pos) = self.players.iter().position(|p| p.id == peer) else {
            return Vec::new();
        };
        let player = self.players.remove(pos);
        info!(peer = %peer, name = %player.name, "player left");
        let mut out = vec![Envelope::to_all(Message::PlayerLeft {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
        })];

        match self.phase() {
            Phase::Lobby => {}
            Phase::Playing => {
                let Some(game) = self.game.as_mut() else {
                    return out;
                };
                match game.remove_player(peer) {
                    Some(winner) => {
                        info!(winner = %winner, "last player standing");
                        out.extend(self.finish(winner));
                    }
                    None => out.extend(self.state_envelopes()),
                }
            }
            Phase::GameOver => {
                self.votes.remove(peer);
                self.voters_needed = self.voters_needed.min(self.players.len());
                out.extend(self.maybe_restart());
            }
        }
        out
    }

    /// Starts a round. Only the host may start, and not while one is running.
    pub fn start_game(&mut self, requester: &str) -> Result<Vec<Envelope>, GameError> {
        if requester != self.host_id {
            return Err(GameError::NotHost);
        }
        if self.phase() == Phase::Playing {
            return Err(GameError::GameInProgress);
        }
        let ids: Vec<PeerId> = self.players.iter().map(|p| p.id.clone()).collect();
        let game = Game::start(&ids, self.rules.clone(), &mut self.rng)?;
        Ok(self.begin_round(game))
    }

    /// Starts a round from a prepared game, bypassing the shuffle.
    pub fn begin_round(&mut self, game: Game) -> Vec<Envelope> {
        info!(order = ?game.turn_order(), deck = game.deck_len(), "game started");
        let table = game.table_state();
        let out = game
            .turn_order()
            .iter()
            .map(|id| {
                Envelope::to_peer(
                    id.clone(),
                    Message::InitialState {
                        table: table.clone(),
                        hand: game.hand(id).map(<[_]>::to_vec).unwrap_or_default(),
                    },
                )
            })
            .collect();
        self.votes.clear();
        self.voters_needed = 0;
        self.game = Some(game);
        out
    }

    /// Validates one inbound message from `sender`.
    pub fn handle(&mut self, sender: &str, message: Message) -> Vec<Envelope> {
        debug!(peer = %sender, kind = message.kind(), "request");
        if !self.players.iter().any(|p| p.id == sender) {
            warn!(peer = %sender, "message from unknown peer dropped");
            return Vec::new();
        }
        let result = match message {
            Message::BoardMoveRequest(board) => self.handle_board_move(sender, board),
            Message::EndTurnRequest { turn_seq, board } => {
                self.handle_end_turn(sender, turn_seq, board)
            }
            Message::DrawTileRequest { turn_seq } => self.handle_draw(sender, turn_seq),
            Message::PlayAgainVote { .. } => self.handle_vote(sender),
            other => {
                warn!(peer = %sender, kind = other.kind(), "unexpected message dropped");
                Ok(Vec::new())
            }
        };
        result.unwrap_or_else(|err| self.reject(sender, err))
    }

    fn reject(&self, sender: &str, err: GameError) -> Vec<Envelope> {
        if err.is_silent() {
            debug!(peer = %sender, reason = %err, "request dropped");
            return Vec::new();
        }
        warn!(peer = %sender, reason = %err, "request rejected");
        vec![Envelope::to_peer(
            sender,
            Message::Error {
                message: err.to_string(),
            },
        )]
    }

    fn running_game(&mut self) -> Result<&mut Game, GameError> {
        match self.game.as_mut() {
            Some(game) if !game.is_over() => Ok(game),
            _ => Err(GameError::GameNotRunning),
        }
    }

    fn handle_board_move(&mut self, sender: &str, board: Board) -> Result<Vec<Envelope>, GameError> {
        self.running_game()?.set_preview(sender, board.clone())?;
        Ok(vec![Envelope::to_all_except(sender, Message::BoardUpdate(board))])
    }

    fn handle_end_turn(
        &mut self,
        sender: &str,
        turn_seq: u64,
        board: Board,
    ) -> Result<Vec<Envelope>, GameError> {
        let outcome = self.running_game()?.end_turn(sender, turn_seq, board)?;
        Ok(self.after_turn(sender, outcome))
    }

    fn handle_draw(&mut self, sender: &str, turn_seq: u64) -> Result<Vec<Envelope>, GameError> {
        let outcome = self.running_game()?.draw(sender, turn_seq)?;
        Ok(self.after_turn(sender, outcome))
    }

    fn after_turn(&mut self, sender: &str, outcome: TurnOutcome) -> Vec<Envelope> {
        match outcome {
            TurnOutcome::Played {
                next_turn_index,
                placed,
                initial_meld,
            } => {
                info!(peer = %sender, placed = placed.len(), initial_meld, next = next_turn_index, "turn committed");
                self.state_envelopes()
            }
            TurnOutcome::Drew {
                next_turn_index,
                tile,
            } => {
                info!(peer = %sender, drew = tile.is_some(), next = next_turn_index, "turn passed with draw");
                let mut out = Vec::new();
                if let Some(tile) = tile {
                    out.push(Envelope::to_peer(sender, Message::TileDrawn { tile }));
                }
                out.extend(self.state_envelopes());
                out
            }
            TurnOutcome::Won { winner } => self.finish(winner),
        }
    }

    /// One `state_update` per player, each carrying that player's own hand.
    fn state_envelopes(&self) -> Vec<Envelope> {
        let Some(game) = &self.game else {
            return Vec::new();
        };
        let table = game.table_state();
        game.turn_order()
            .iter()
            .map(|id| {
                Envelope::to_peer(
                    id.clone(),
                    Message::StateUpdate {
                        table: table.clone(),
                        hand: game.hand(id).map(<[_]>::to_vec).unwrap_or_default(),
                    },
                )
            })
            .collect()
    }

    fn finish(&mut self, winner: PeerId) -> Vec<Envelope> {
        let winner_name = self.player_name(&winner);
        info!(winner = %winner, name = %winner_name, "game over");
        self.votes.clear();
        self.voters_needed = self.players.len();
        let board = self
            .game
            .as_ref()
            .map(|g| g.board().clone())
            .unwrap_or_default();
        vec![Envelope::to_all(Message::GameOver {
            winner_id: winner,
            winner_name,
            board,
        })]
    }

    fn handle_vote(&mut self, sender: &str) -> Result<Vec<Envelope>, GameError> {
        if self.phase() != Phase::GameOver {
            return Err(GameError::GameNotRunning);
        }
        if !self.votes.insert(sender.to_string()) {
            return Ok(Vec::new());
        }
        info!(peer = %sender, votes = self.votes.len(), needed = self.voters_needed, "rematch vote");
        let mut out = vec![Envelope::to_all(Message::PlayAgainVote {
            player_id: sender.to_string(),
        })];
        out.extend(self.maybe_restart());
        Ok(out)
    }

    fn maybe_restart(&mut self) -> Vec<Envelope> {
        if self.voters_needed == 0 || self.votes.len() < self.voters_needed {
            return Vec::new();
        }
        let ids: Vec<PeerId> = self.players.iter().map(|p| p.id.clone()).collect();
        let next_seq = self.game.as_ref().map_or(0, |g| g.turn_seq() + 1);
        match Game::start(&ids, self.rules.clone(), &mut self.rng) {
            Ok(game) => self.begin_round(game.starting_at_turn(next_seq)),
            Err(err) => {
                warn!(reason = %err, "rematch could not start");
                self.game = None;
                self.votes.clear();
                self.voters_needed = 0;
                Vec::new()
            }
        }
    }
}
