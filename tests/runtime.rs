use rummikub::network::{self, PeerEvent};
use rummikub::runtime::{HostRuntime, LocalAction, run_guest};
use rummikub::{Board, ClientEvent, Coord, HostSession, Message, Player, Rules};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

/// Longer than a turn, so the turn timer can fire under a paused clock.
const PATIENCE: Duration = Duration::from_secs(120);

/// Every event up to and including the first one `wanted` accepts.
async fn collect_until(
    events: &mut UnboundedReceiver<ClientEvent>,
    wanted: impl Fn(&ClientEvent) -> bool,
) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    loop {
        let event = timeout(PATIENCE, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream ended");
        let done = wanted(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

async fn wait_for(
    events: &mut UnboundedReceiver<ClientEvent>,
    wanted: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    let mut seen = collect_until(events, wanted).await;
    seen.pop().expect("at least the wanted event")
}

struct Table {
    peer_tx: UnboundedSender<PeerEvent>,
    host_actions: UnboundedSender<LocalAction>,
    host_events: UnboundedReceiver<ClientEvent>,
    guest_actions: UnboundedSender<LocalAction>,
    guest_events: UnboundedReceiver<ClientEvent>,
    host_task: JoinHandle<()>,
    guest_task: JoinHandle<()>,
}

/// Host "h" plus guest "g", round started. Returns who moves first.
async fn started_table() -> (Table, String) {
    let (peer_tx, peer_rx) = unbounded_channel();
    let (host_actions, host_actions_rx) = unbounded_channel();
    let (host_events_tx, mut host_events) = unbounded_channel();
    let (session, greeting) = HostSession::create_room(Player::new("h", "Hana"), Rules::default(), Some(5));
    let host_task = tokio::spawn(HostRuntime::new(session, greeting, host_events_tx).run(peer_rx, host_actions_rx));

    let (link, inbound) = network::connect(&peer_tx, "g", Some("Gil".into())).unwrap();
    let (guest_actions, guest_actions_rx) = unbounded_channel();
    let (guest_events_tx, mut guest_events) = unbounded_channel();
    let guest_task = tokio::spawn(run_guest(
        link,
        inbound,
        guest_actions_rx,
        guest_events_tx,
        Rules::default().turn_timeout,
    ));

    wait_for(&mut host_events, |e| matches!(e, ClientEvent::RosterChanged(p) if p.len() == 2)).await;
    host_actions.send(LocalAction::StartGame).unwrap();
    wait_for(&mut host_events, |e| matches!(e, ClientEvent::TableChanged { .. })).await;
    let ClientEvent::TableChanged { current_player, .. } =
        wait_for(&mut guest_events, |e| matches!(e, ClientEvent::TableChanged { .. })).await
    else {
        unreachable!();
    };
    let table = Table {
        peer_tx,
        host_actions,
        host_events,
        guest_actions,
        guest_events,
        host_task,
        guest_task,
    };
    (table, current_player.expect("someone is on turn"))
}

#[tokio::test]
async fn guest_plays_against_host_over_links() {
    let (peer_tx, peer_rx) = unbounded_channel();
    let (host_actions, host_actions_rx) = unbounded_channel();
    let (host_events_tx, mut host_events) = unbounded_channel();
    let (session, greeting) = HostSession::create_room(Player::new("h", "Hana"), Rules::default(), Some(3));
    let host = HostRuntime::new(session, greeting, host_events_tx);
    let host_task = tokio::spawn(host.run(peer_rx, host_actions_rx));

    let (link, inbound) = network::connect(&peer_tx, "g", Some("Gil".into())).unwrap();
    let (guest_actions, guest_actions_rx) = unbounded_channel();
    let (guest_events_tx, mut guest_events) = unbounded_channel();
    let guest_task = tokio::spawn(run_guest(
        link,
        inbound,
        guest_actions_rx,
        guest_events_tx,
        Duration::from_secs(60),
    ));

    wait_for(&mut host_events, |e| matches!(e, ClientEvent::RosterChanged(p) if p.len() == 2)).await;
    wait_for(&mut guest_events, |e| matches!(e, ClientEvent::RosterChanged(p) if p.len() == 2)).await;

    // Guests cannot start the round.
    guest_actions.send(LocalAction::StartGame).unwrap();
    wait_for(&mut guest_events, |e| matches!(e, ClientEvent::Rejected(_))).await;

    host_actions.send(LocalAction::StartGame).unwrap();
    wait_for(&mut guest_events, |e| *e == ClientEvent::GameStarted).await;
    let ClientEvent::TableChanged {
        current_player,
        tile_deck_count,
    } = wait_for(&mut guest_events, |e| matches!(e, ClientEvent::TableChanged { .. })).await
    else {
        unreachable!();
    };
    assert_eq!(tile_deck_count, 78);

    // Garbage on the wire is dropped without disturbing the game.
    peer_tx
        .send(PeerEvent::Data {
            peer: "g".into(),
            raw: "{not json".into(),
        })
        .unwrap();

    match current_player.as_deref() {
        Some("g") => guest_actions.send(LocalAction::EndTurn).unwrap(),
        Some("h") => host_actions.send(LocalAction::EndTurn).unwrap(),
        other => panic!("unexpected current player {other:?}"),
    }
    wait_for(&mut guest_events, |e| {
        matches!(e, ClientEvent::TableChanged { tile_deck_count: 77, .. })
    })
    .await;

    // Late arrivals are turned away once the round is under way.
    let (late, mut late_inbound) = network::connect(&peer_tx, "late", None).unwrap();
    let raw = timeout(Duration::from_secs(5), late_inbound.recv())
        .await
        .unwrap()
        .expect("refusal frame");
    let Message::Error { message } = Message::decode(&raw).unwrap() else {
        panic!("expected an error frame");
    };
    assert!(message.contains("in progress"), "{message}");
    assert!(timeout(Duration::from_secs(5), late_inbound.recv()).await.unwrap().is_none());
    drop(late);

    // The guest leaving hands the host the win.
    guest_actions.send(LocalAction::Leave).unwrap();
    let over = wait_for(&mut host_events, |e| matches!(e, ClientEvent::GameOver { .. })).await;
    assert_eq!(
        over,
        ClientEvent::GameOver {
            winner_name: "Hana".into(),
            won: true
        }
    );

    host_actions.send(LocalAction::Leave).unwrap();
    host_task.await.unwrap();
    guest_task.await.unwrap();
}

#[tokio::test]
async fn guest_sees_session_end_when_host_leaves() {
    let (peer_tx, peer_rx) = unbounded_channel();
    let (host_actions, host_actions_rx) = unbounded_channel();
    let (host_events_tx, _host_events) = unbounded_channel();
    let (session, greeting) = HostSession::create_room(Player::new("h", "Hana"), Rules::default(), None);
    let host_task = tokio::spawn(HostRuntime::new(session, greeting, host_events_tx).run(peer_rx, host_actions_rx));

    let (link, inbound) = network::connect(&peer_tx, "g", None).unwrap();
    let (_guest_actions, guest_actions_rx) = unbounded_channel();
    let (guest_events_tx, mut guest_events) = unbounded_channel();
    let guest_task = tokio::spawn(run_guest(
        link,
        inbound,
        guest_actions_rx,
        guest_events_tx,
        Duration::from_secs(60),
    ));

    let ClientEvent::RosterChanged(players) =
        wait_for(&mut guest_events, |e| matches!(e, ClientEvent::RosterChanged(_))).await
    else {
        unreachable!();
    };
    assert_eq!(players[1].name, "Player 2");

    host_actions.send(LocalAction::Leave).unwrap();
    host_task.await.unwrap();
    wait_for(&mut guest_events, |e| *e == ClientEvent::SessionEnded).await;
    guest_task.await.unwrap();
}

#[tokio::test]
async fn refused_duplicate_id_does_not_unseat_player() {
    let (mut table, first) = started_table().await;
    if first == "h" {
        table.host_actions.send(LocalAction::EndTurn).unwrap();
        wait_for(&mut table.guest_events, |e| matches!(e, ClientEvent::TurnStarted { .. })).await;
    }

    let (impostor, mut impostor_inbound) = network::connect(&table.peer_tx, "g", Some("Impostor".into())).unwrap();
    let raw = timeout(PATIENCE, impostor_inbound.recv())
        .await
        .unwrap()
        .expect("refusal frame");
    assert!(matches!(Message::decode(&raw).unwrap(), Message::Error { .. }));
    drop(impostor);

    // The real guest's next request queues behind the impostor's close.
    let deck_after = if first == "h" { 76 } else { 77 };
    let drawn = move |e: &ClientEvent| {
        matches!(e, ClientEvent::TableChanged { tile_deck_count, .. } if *tile_deck_count == deck_after)
    };
    table.guest_actions.send(LocalAction::EndTurn).unwrap();
    let seen = collect_until(&mut table.host_events, drawn).await;
    assert!(
        seen.iter()
            .all(|e| !matches!(e, ClientEvent::PlayerLeft { .. } | ClientEvent::GameOver { .. })),
        "{seen:?}"
    );
    wait_for(&mut table.guest_events, drawn).await;

    table.guest_actions.send(LocalAction::Leave).unwrap();
    table.guest_task.await.unwrap();
    wait_for(&mut table.host_events, |e| matches!(e, ClientEvent::PlayerLeft { .. })).await;
    table.host_actions.send(LocalAction::Leave).unwrap();
    table.host_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn idle_turn_times_out_into_undo_and_draw() {
    let (mut table, first) = started_table().await;
    let (actor, observer) = if first == "h" {
        (&table.host_actions, &mut table.guest_events)
    } else {
        (&table.guest_actions, &mut table.host_events)
    };
    let started = Instant::now();

    // One stray tile is not a valid board, so the timer must roll it back.
    actor
        .send(LocalAction::Place {
            hand_index: 0,
            at: Coord::new(0, 0),
        })
        .unwrap();
    let preview = wait_for(observer, |e| matches!(e, ClientEvent::BoardPreview(_))).await;
    assert!(matches!(preview, ClientEvent::BoardPreview(ref b) if b.len() == 1));

    let seen = collect_until(observer, |e| matches!(e, ClientEvent::TableChanged { .. })).await;
    assert!(started.elapsed() >= Rules::default().turn_timeout);
    assert_eq!(seen[0], ClientEvent::BoardPreview(Board::new()));
    let Some(ClientEvent::TableChanged {
        current_player,
        tile_deck_count,
    }) = seen.last()
    else {
        unreachable!();
    };
    assert_eq!(*tile_deck_count, 77);
    assert_ne!(current_player.as_deref(), Some(first.as_str()));

    table.host_actions.send(LocalAction::Leave).unwrap();
    table.host_task.await.unwrap();
    table.guest_task.await.unwrap();
}
