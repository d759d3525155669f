use clap::Parser;
use rummikub::bot;
use rummikub::client::ClientEvent;
use rummikub::config::Config;
use rummikub::host::HostSession;
use rummikub::network;
use rummikub::player::Player;
use rummikub::runtime::{HostRuntime, LocalAction, run_guest};
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let rules = config.rules();
    let minimum = rules.initial_meld_minimum;
    let seats = config.players as usize;

    let (peer_tx, peer_rx) = unbounded_channel();
    let (host_actions, host_actions_rx) = unbounded_channel();
    let (host_events_tx, mut host_events) = unbounded_channel();
    let (session, greeting) = HostSession::create_room(Player::new("host", "Host"), rules.clone(), config.seed);
    let host = HostRuntime::new(session, greeting, host_events_tx);
    let host_task = tokio::spawn(host.run(peer_rx, host_actions_rx));

    for seat in 1..seats {
        let id = format!("guest-{}", seat);
        let (link, inbound) = network::connect(&peer_tx, id, Some(format!("Bot {}", seat)))?;
        let (actions, actions_rx) = unbounded_channel();
        let (events_tx, events) = unbounded_channel();
        tokio::spawn(run_guest(link, inbound, actions_rx, events_tx, rules.turn_timeout));
        tokio::spawn(bot::drive(events, actions, minimum));
    }

    let mut turns = 0usize;
    let mut on_turn = false;
    while let Some(event) = host_events.recv().await {
        match event {
            ClientEvent::RosterChanged(players) => {
                info!(players = players.len(), "roster");
                if players.len() == seats {
                    host_actions.send(LocalAction::StartGame)?;
                }
            }
            ClientEvent::TableChanged { current_player, tile_deck_count } => {
                turns += 1;
                info!(turn = turns, current = ?current_player, deck = tile_deck_count, "table");
                if turns > config.max_turns {
                    println!("No winner after {} turns", config.max_turns);
                    break;
                }
            }
            ClientEvent::TurnStarted { hand, board, has_made_initial_meld, .. } => {
                on_turn = true;
                for action in bot::plan_turn(&hand, &board, has_made_initial_meld, minimum) {
                    host_actions.send(action)?;
                }
            }
            ClientEvent::TurnEnded => on_turn = false,
            ClientEvent::Rejected(reason) if on_turn => {
                info!(reason = %reason, "host plan rejected");
                host_actions.send(LocalAction::Undo)?;
                host_actions.send(LocalAction::EndTurn)?;
            }
            ClientEvent::GameOver { winner_name, .. } => {
                println!("{} wins after {} turns", winner_name, turns);
                break;
            }
            _ => {}
        }
    }

    host_actions.send(LocalAction::Leave)?;
    drop(peer_tx);
    host_task.await?;
    Ok(())
}
