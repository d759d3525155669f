use crate::board::Coord;
use crate::client::{ClientEvent, ClientSession};
use crate::error::GameError;
use crate::host::{Envelope, HostSession};
use crate::network::{HostLink, PeerEvent, PeerLink};
use crate::player::PeerId;
use crate::protocol::Message;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Things a participant's UI can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAction {
    StartGame,
    Place { hand_index: usize, at: Coord },
    Move { from: Coord, to: Coord },
    ReturnToHand { at: Coord },
    Undo,
    EndTurn,
    VotePlayAgain,
    Leave,
}

/// A participant's client state plus its turn timer.
struct Seat {
    client: ClientSession,
    turn_timeout: Duration,
    deadline: Option<Instant>,
    /// Turn the deadline was armed for. A repeated `TurnStarted` for the same
    /// turn keeps the running deadline.
    armed_turn: Option<u64>,
    events: UnboundedSender<ClientEvent>,
}

impl Seat {
    fn new(client: ClientSession, turn_timeout: Duration, events: UnboundedSender<ClientEvent>) -> Self {
        Self {
            client,
            turn_timeout,
            deadline: None,
            armed_turn: None,
            events,
        }
    }

    fn emit(&mut self, event: ClientEvent) {
        match &event {
            ClientEvent::TurnStarted { turn_seq, .. } => {
                if self.armed_turn != Some(*turn_seq) {
                    self.armed_turn = Some(*turn_seq);
                    self.deadline = Some(Instant::now() + self.turn_timeout);
                }
            }
            ClientEvent::GameStarted
            | ClientEvent::TurnEnded
            | ClientEvent::GameOver { .. }
            | ClientEvent::SessionEnded => {
                self.deadline = None;
                self.armed_turn = None;
            }
            _ => {}
        }
        let _ = self.events.send(event);
    }

    fn deliver(&mut self, message: Message) {
        for event in self.client.handle(message) {
            self.emit(event);
        }
    }

    /// Applies a local action; the returned messages go to the host.
    fn act(&mut self, action: LocalAction) -> Vec<Message> {
        let client = &mut self.client;
        let result = match action {
            LocalAction::Place { hand_index, at } => client.place_from_hand(hand_index, at).map(|m| vec![m]),
            LocalAction::Move { from, to } => client.move_tile(from, to).map(|m| vec![m]),
            LocalAction::ReturnToHand { at } => client.return_to_hand(at).map(|m| vec![m]),
            LocalAction::Undo => client.undo().map(|m| vec![m]),
            LocalAction::EndTurn => client.end_turn().map(|m| vec![m]),
            LocalAction::VotePlayAgain => client.vote_play_again().map(|m| vec![m]),
            LocalAction::StartGame | LocalAction::Leave => Ok(Vec::new()),
        };
        match result {
            Ok(out) => out,
            Err(err) => {
                debug!(me = %self.client.my_id(), reason = %err, "local action refused");
                self.emit(ClientEvent::Rejected(err.to_string()));
                Vec::new()
            }
        }
    }

    fn expire(&mut self) -> Vec<Message> {
        self.deadline = None;
        self.client.on_turn_timeout()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// The host's single event loop. Guest requests, the host's own actions and
/// its turn timer are serialized here, so no two requests are ever validated
/// against the same state.
pub struct HostRuntime {
    session: HostSession,
    seat: Seat,
    links: HashMap<PeerId, PeerLink>,
}

impl HostRuntime {
    pub fn new(session: HostSession, greeting: Vec<Envelope>, events: UnboundedSender<ClientEvent>) -> Self {
        let client = ClientSession::new(session.host_id().clone());
        let turn_timeout = session.rules().turn_timeout;
        let mut runtime = Self {
            session,
            seat: Seat::new(client, turn_timeout, events),
            links: HashMap::new(),
        };
        runtime.dispatch(greeting);
        runtime
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    /// Fans messages out to guests and feeds the host's own client through
    /// the same path.
    fn dispatch(&mut self, envelopes: Vec<Envelope>) {
        let host_id = self.session.host_id().clone();
        for envelope in envelopes {
            for (peer, link) in &self.links {
                if envelope.to.includes(peer) {
                    if let Err(err) = link.send(&envelope.message) {
                        warn!(peer = %peer, error = %err, "send failed");
                    }
                }
            }
            if envelope.to.includes(&host_id) {
                self.seat.deliver(envelope.message);
            }
        }
    }

    fn submit(&mut self, requests: Vec<Message>) {
        let host_id = self.session.host_id().clone();
        for request in requests {
            let out = self.session.handle(&host_id, request);
            self.dispatch(out);
        }
    }

    fn on_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Open { peer, nickname, link } => match self.session.join(peer.clone(), nickname) {
                Ok(out) => {
                    self.links.insert(peer, link);
                    self.dispatch(out);
                }
                Err(err) => {
                    let _ = link.send(&Message::Error {
                        message: err.to_string(),
                    });
                }
            },
            PeerEvent::Data { peer, raw } => match Message::decode(&raw) {
                Ok(message) => {
                    let out = self.session.handle(&peer, message);
                    self.dispatch(out);
                }
                Err(err) => warn!(peer = %peer, error = %err, "malformed frame dropped"),
            },
            PeerEvent::Close { peer, serial } => {
                if self.links.get(&peer).map(PeerLink::serial) != Some(serial) {
                    debug!(peer = %peer, serial, "close for a link that is not seated");
                    return;
                }
                self.links.remove(&peer);
                let out = self.session.leave(&peer);
                self.dispatch(out);
            }
        }
    }

    fn on_action(&mut self, action: LocalAction) {
        if action == LocalAction::StartGame {
            let host_id = self.session.host_id().clone();
            match self.session.start_game(&host_id) {
                Ok(out) => self.dispatch(out),
                Err(err) => self.seat.emit(ClientEvent::Rejected(err.to_string())),
            }
            return;
        }
        let requests = self.seat.act(action);
        self.submit(requests);
    }

    /// Runs until the host leaves or its UI goes away. Dropping the runtime
    /// drops every link, which ends the session for all guests.
    pub async fn run(
        mut self,
        mut peers: UnboundedReceiver<PeerEvent>,
        mut actions: UnboundedReceiver<LocalAction>,
    ) {
        info!(host = %self.session.host_id(), "host loop started");
        loop {
            tokio::select! {
                event = peers.recv() => match event {
                    Some(event) => self.on_peer_event(event),
                    None => break,
                },
                action = actions.recv() => match action {
                    Some(LocalAction::Leave) | None => break,
                    Some(action) => self.on_action(action),
                },
                _ = wait_until(self.seat.deadline) => {
                    let requests = self.seat.expire();
                    self.submit(requests);
                }
            }
        }
        info!(host = %self.session.host_id(), "host loop finished");
    }
}

/// A guest's event loop: host frames in, local actions and timer expiries out.
pub async fn run_guest(
    link: HostLink,
    mut inbound: UnboundedReceiver<String>,
    mut actions: UnboundedReceiver<LocalAction>,
    events: UnboundedSender<ClientEvent>,
    turn_timeout: Duration,
) {
    let me = link.me().clone();
    let mut seat = Seat::new(ClientSession::new(me.clone()), turn_timeout, events);
    info!(me = %me, "guest loop started");
    loop {
        let requests = tokio::select! {
            raw = inbound.recv() => match raw {
                Some(raw) => {
                    match Message::decode(&raw) {
                        Ok(message) => seat.deliver(message),
                        Err(err) => warn!(me = %me, error = %err, "malformed frame dropped"),
                    }
                    Vec::new()
                }
                None => {
                    for event in seat.client.on_host_closed() {
                        seat.emit(event);
                    }
                    break;
                }
            },
            action = actions.recv() => match action {
                Some(LocalAction::Leave) | None => {
                    seat.client.leave();
                    break;
                }
                Some(LocalAction::StartGame) => {
                    seat.emit(ClientEvent::Rejected(GameError::NotHost.to_string()));
                    Vec::new()
                }
                Some(action) => seat.act(action),
            },
            _ = wait_until(seat.deadline) => seat.expire(),
        };
        for request in requests {
            if let Err(err) = link.send(&request) {
                warn!(me = %me, error = %err, "host unreachable");
            }
        }
    }
    info!(me = %me, "guest loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use tokio::sync::mpsc::unbounded_channel;

    fn turn_started(turn_seq: u64) -> ClientEvent {
        ClientEvent::TurnStarted {
            turn_seq,
            hand: Vec::new(),
            board: Board::new(),
            has_made_initial_meld: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_armed_once_per_turn() {
        let (tx, _rx) = unbounded_channel();
        let mut seat = Seat::new(ClientSession::new("me"), Duration::from_secs(60), tx);

        seat.emit(turn_started(3));
        let first = seat.deadline;
        assert!(first.is_some());

        tokio::time::advance(Duration::from_secs(20)).await;
        seat.emit(turn_started(3));
        assert_eq!(seat.deadline, first);

        seat.emit(ClientEvent::TurnEnded);
        assert_eq!(seat.deadline, None);

        seat.emit(turn_started(5));
        assert!(seat.deadline > first);
    }
}
