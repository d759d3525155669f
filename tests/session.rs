use rummikub::deck::Deck;
use rummikub::{
    Board, ClientSession, Color, Coord, Envelope, Game, GameError, HostSession, Message, PeerId,
    Player, Rules, Tile,
};
use std::collections::BTreeMap;

/// Routes host output to every client through the JSON wire form and keeps a
/// log of what each client received.
struct Room {
    host: HostSession,
    clients: BTreeMap<PeerId, ClientSession>,
    log: Vec<(PeerId, Message)>,
}

impl Room {
    fn new(guests: &[(&str, &str)]) -> Self {
        let (host, greeting) = HostSession::create_room(Player::new("h", "Hana"), Rules::default(), Some(11));
        let mut room = Self {
            host,
            clients: BTreeMap::new(),
            log: Vec::new(),
        };
        room.clients.insert("h".into(), ClientSession::new("h"));
        room.deliver(greeting);
        for (id, name) in guests {
            room.clients.insert(id.to_string(), ClientSession::new(*id));
            let out = room.host.join(id.to_string(), Some(name.to_string())).unwrap();
            room.deliver(out);
        }
        room
    }

    fn deliver(&mut self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            let raw = envelope.message.encode().unwrap();
            for (id, client) in self.clients.iter_mut() {
                if envelope.to.includes(id) {
                    let message = Message::decode(&raw).unwrap();
                    self.log.push((id.clone(), message.clone()));
                    client.handle(message);
                }
            }
        }
    }

    fn send(&mut self, from: &str, message: Message) {
        let raw = message.encode().unwrap();
        let out = self.host.handle(from, Message::decode(&raw).unwrap());
        self.deliver(out);
    }

    fn client(&mut self, id: &str) -> &mut ClientSession {
        self.clients.get_mut(id).unwrap()
    }

    fn received(&self, id: &str) -> Vec<&Message> {
        self.log.iter().filter(|(to, _)| to == id).map(|(_, m)| m).collect()
    }

    fn begin(&mut self, order: &[&str], hands: Vec<(&str, Vec<Tile>)>) {
        let game = Game::from_hands(
            Rules::default(),
            Deck::standard(),
            order.iter().map(|s| s.to_string()).collect(),
            hands.into_iter().map(|(id, h)| (id.to_string(), h)).collect(),
        )
        .unwrap();
        let out = self.host.begin_round(game);
        self.deliver(out);
    }

    /// Lays the client's hand tiles, in hand order, left to right on row `y`.
    fn lay_all(&mut self, id: &str, count: usize, y: i32) {
        for x in 0..count {
            let request = self.client(id).place_from_hand(0, Coord::new(x as i32, y)).unwrap();
            self.send(id, request);
        }
    }
}

fn red(n: u8) -> Tile {
    Tile::new(Color::Red, n)
}

#[test]
fn roster_reaches_every_client() {
    let mut room = Room::new(&[("g1", "Gil"), ("g2", "Gus")]);
    for id in ["h", "g1", "g2"] {
        assert_eq!(room.client(id).players().len(), 3);
        assert_eq!(room.client(id).host_id().map(String::as_str), Some("h"));
    }
}

#[test]
fn two_player_start_deals_fourteen() {
    let mut room = Room::new(&[("g", "Gil")]);
    let out = room.host.start_game("h").unwrap();
    room.deliver(out);

    let game = room.host.game().unwrap();
    assert_eq!(game.deck_len(), 78);
    let host_hand = game.hand("h").unwrap().to_vec();
    let guest_hand = game.hand("g").unwrap().to_vec();

    for (id, hand) in [("h", host_hand), ("g", guest_hand)] {
        let client = room.client(id);
        let table = client.table().unwrap();
        assert_eq!(table.tile_deck_count, 78);
        assert_eq!(table.player_states.len(), 2);
        assert!(table.player_states.values().all(|s| s.hand_size == 14));
        assert_eq!(client.hand(), hand.as_slice());
    }
    let on_turn = ["h", "g"].iter().filter(|id| room.client(id).is_my_turn()).count();
    assert_eq!(on_turn, 1);
}

#[test]
fn low_initial_meld_rejected_and_undone() {
    let mut room = Room::new(&[("g", "Gil")]);
    let meld = vec![red(7), red(8), Tile::joker(), red(10)];
    let mut hand = meld.clone();
    hand.push(Tile::new(Color::Blue, 1));
    room.begin(&["g", "h"], vec![("g", hand.clone()), ("h", vec![Tile::new(Color::Black, 5)])]);

    room.lay_all("g", 4, 0);
    // The host relays the live preview to the waiting player.
    assert_eq!(room.client("h").board().len(), 4);
    assert_eq!(room.host.game().unwrap().preview().len(), 4);

    let request = room.client("g").end_turn().unwrap();
    room.send("g", request);

    let Some(Message::Error { message }) = room.received("g").last().cloned().cloned() else {
        panic!("expected a rejection");
    };
    assert!(message.contains("25"), "{message}");
    let game = room.host.game().unwrap();
    assert!(game.board().is_empty());
    assert_eq!(game.current_turn_index(), 0);
    assert_eq!(game.hand("g").unwrap().len(), 5);

    let sync = room.client("g").undo().unwrap();
    room.send("g", sync);
    assert_eq!(room.client("g").hand(), hand.as_slice());
    assert!(room.client("g").board().is_empty());
    assert!(room.client("h").board().is_empty());
    assert!(room.client("g").is_my_turn());
}

#[test]
fn valid_opening_commits_and_passes_turn() {
    let mut room = Room::new(&[("g", "Gil")]);
    let mut hand = vec![red(9), red(10), red(11)];
    hand.push(Tile::new(Color::Blue, 2));
    room.begin(&["g", "h"], vec![("g", hand), ("h", vec![Tile::joker()])]);

    room.lay_all("g", 3, 0);
    let request = room.client("g").end_turn().unwrap();
    room.send("g", request);

    let game = room.host.game().unwrap();
    assert_eq!(game.board().len(), 3);
    assert_eq!(game.current_turn_index(), 1);
    assert!(game.player_state("g").unwrap().has_made_initial_meld);

    for id in ["g", "h"] {
        assert_eq!(room.client(id).board().len(), 3);
    }
    assert_eq!(room.client("g").hand(), &[Tile::new(Color::Blue, 2)]);
    assert!(room.client("g").has_made_initial_meld());
    assert!(room.client("h").is_my_turn());
}

#[test]
fn emptying_hand_ends_the_game() {
    let mut room = Room::new(&[("g", "Gil")]);
    room.begin(
        &["g", "h"],
        vec![("g", vec![red(11), red(12), red(13)]), ("h", vec![Tile::joker()])],
    );
    room.lay_all("g", 3, 0);
    let request = room.client("g").end_turn().unwrap();
    room.send("g", request);

    for id in ["g", "h"] {
        let received = room.received(id);
        let over = received
            .iter()
            .position(|m| matches!(m, Message::GameOver { winner_name, .. } if winner_name == "Gil"))
            .expect("game_over broadcast");
        assert!(
            received[over..]
                .iter()
                .all(|m| !matches!(m, Message::StateUpdate { .. })),
            "no turn change after game over"
        );
        assert_eq!(room.client(id).winner(), Some("Gil"));
    }

    // Nothing moves the turn afterwards.
    let before = room.log.len();
    room.send("h", Message::DrawTileRequest { turn_seq: 0 });
    assert_eq!(room.log.len(), before);
    assert_eq!(room.client("h").end_turn(), Err(GameError::GameNotRunning));
}

#[test]
fn replayed_requests_apply_once() {
    let mut room = Room::new(&[("g", "Gil")]);
    room.begin(&["g", "h"], vec![("g", vec![]), ("h", vec![])]);
    let request = room.client("g").end_turn().unwrap();
    assert_eq!(request, Message::DrawTileRequest { turn_seq: 0 });

    room.send("g", request.clone());
    room.send("g", request);
    let game = room.host.game().unwrap();
    assert_eq!(game.deck_len(), 105);
    assert_eq!(game.current_turn_index(), 1);
    assert_eq!(game.hand("g").unwrap().len(), 1);

    let drawn = room
        .received("g")
        .iter()
        .filter(|m| matches!(m, Message::TileDrawn { .. }))
        .count();
    assert_eq!(drawn, 1);
    assert_eq!(room.client("g").hand().len(), 1);
}

#[test]
fn replay_arriving_after_the_turn_wraps_is_ignored() {
    let mut room = Room::new(&[("g", "Gil")]);
    room.begin(&["g", "h"], vec![("g", vec![]), ("h", vec![])]);
    let first_draw = room.client("g").end_turn().unwrap();
    room.send("g", first_draw.clone());
    let request = room.client("h").end_turn().unwrap();
    room.send("h", request);

    // "g" is on turn again at the same index when the duplicate lands.
    assert!(room.client("g").is_my_turn());
    assert_eq!(room.host.game().unwrap().current_turn_index(), 0);
    let before = room.log.len();
    room.send("g", first_draw);

    assert_eq!(room.log.len(), before);
    let game = room.host.game().unwrap();
    assert_eq!(game.hand("g").unwrap().len(), 1);
    assert_eq!(game.deck_len(), 104);
    assert_eq!(game.turn_seq(), 2);
    assert_eq!(room.client("g").end_turn().unwrap(), Message::DrawTileRequest { turn_seq: 2 });
}

#[test]
fn out_of_turn_request_answered_with_error() {
    let mut room = Room::new(&[("g", "Gil")]);
    room.begin(&["g", "h"], vec![("g", vec![]), ("h", vec![])]);
    let mut board = Board::new();
    board.place(Coord::new(0, 0), Tile::joker()).unwrap();
    room.send("h", Message::EndTurnRequest { turn_seq: 0, board });
    assert!(matches!(room.received("h").last(), Some(Message::Error { .. })));
    assert_eq!(room.host.game().unwrap().current_turn_index(), 0);
}

#[test]
fn guest_leaving_mid_game_keeps_turn_order() {
    let mut room = Room::new(&[("g1", "Gil"), ("g2", "Gus")]);
    room.begin(
        &["h", "g1", "g2"],
        vec![("h", vec![]), ("g1", vec![]), ("g2", vec![])],
    );
    let request = room.client("h").end_turn().unwrap();
    room.send("h", request);
    assert!(room.client("g1").is_my_turn());

    room.clients.remove("g1");
    let out = room.host.leave("g1");
    room.deliver(out);

    let game = room.host.game().unwrap();
    assert_eq!(game.turn_order(), &["h".to_string(), "g2".to_string()]);
    assert!(room.client("g2").is_my_turn());
    assert_eq!(room.client("h").players().len(), 2);
    assert!(
        room.received("h")
            .iter()
            .any(|m| matches!(m, Message::PlayerLeft { player_name, .. } if player_name == "Gil"))
    );
}

#[test]
fn rematch_deals_a_fresh_round() {
    let mut room = Room::new(&[("g", "Gil")]);
    room.begin(
        &["g", "h"],
        vec![("g", vec![red(11), red(12), red(13)]), ("h", vec![Tile::joker()])],
    );
    room.lay_all("g", 3, 0);
    let request = room.client("g").end_turn().unwrap();
    room.send("g", request);

    let vote = room.client("g").vote_play_again().unwrap();
    room.send("g", vote);
    assert_eq!(room.client("h").winner(), Some("Gil"));
    let vote = room.client("h").vote_play_again().unwrap();
    room.send("h", vote);

    for id in ["g", "h"] {
        let client = room.client(id);
        assert_eq!(client.winner(), None);
        assert_eq!(client.hand().len(), 14);
        assert!(client.board().is_empty());
    }
}
