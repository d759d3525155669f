use crate::board::{Board, Coord};
use crate::client::ClientEvent;
use crate::meld::meld_value;
use crate::runtime::LocalAction;
use crate::tile::{self, Color, MAX_NUMBER, MIN_NUMBER, Tile};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Disjoint melds that can be laid straight from `hand`, ignoring jokers.
/// Longer melds are taken first.
pub fn find_melds(hand: &[Tile]) -> Vec<Vec<Tile>> {
    let mut candidates: Vec<Vec<Tile>> = Vec::new();

    for number in MIN_NUMBER..=MAX_NUMBER {
        let group: Vec<Tile> = Color::SUITS
            .iter()
            .map(|&color| Tile::new(color, number))
            .filter(|t| hand.contains(t))
            .collect();
        if group.len() >= 3 {
            candidates.push(group);
        }
    }

    for &color in &Color::SUITS {
        let mut streak: Vec<Tile> = Vec::new();
        for number in MIN_NUMBER..=MAX_NUMBER + 1 {
            let tile = Tile::new(color, number);
            if number <= MAX_NUMBER && hand.contains(&tile) {
                streak.push(tile);
                continue;
            }
            if streak.len() >= 3 {
                candidates.push(streak.clone());
            }
            streak.clear();
        }
    }

    candidates.sort_by_key(|m| std::cmp::Reverse(m.len()));
    let mut available = hand.to_vec();
    let mut chosen = Vec::new();
    for meld in candidates {
        if tile::remove_all(&mut available, &meld) {
            chosen.push(meld);
        }
    }
    chosen
}

/// Actions for one turn: lay every meld found on fresh rows and end the
/// turn, or just end the turn (drawing) when nothing qualifies.
pub fn plan_turn(
    hand: &[Tile],
    board: &Board,
    has_made_initial_meld: bool,
    initial_meld_minimum: u32,
) -> Vec<LocalAction> {
    let melds = find_melds(hand);
    let total: u32 = melds.iter().map(|m| meld_value(m)).sum();
    if melds.is_empty() || (!has_made_initial_meld && total < initial_meld_minimum) {
        return vec![LocalAction::EndTurn];
    }

    let mut actions = Vec::new();
    let mut remaining = hand.to_vec();
    let mut y = board.next_free_row();
    for meld in &melds {
        for (x, tile) in meld.iter().enumerate() {
            if let Some(hand_index) = remaining.iter().position(|t| t == tile) {
                remaining.remove(hand_index);
                actions.push(LocalAction::Place {
                    hand_index,
                    at: Coord::new(x as i32, y),
                });
            }
        }
        y += 2;
    }
    actions.push(LocalAction::EndTurn);
    actions
}

/// Plays automatically for one participant until the session or round ends.
pub async fn drive(
    mut events: UnboundedReceiver<ClientEvent>,
    actions: UnboundedSender<LocalAction>,
    initial_meld_minimum: u32,
) {
    let mut on_turn = false;
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::TurnStarted {
                hand,
                board,
                has_made_initial_meld,
                ..
            } => {
                on_turn = true;
                for action in plan_turn(&hand, &board, has_made_initial_meld, initial_meld_minimum) {
                    if actions.send(action).is_err() {
                        return;
                    }
                }
            }
            ClientEvent::TurnEnded => on_turn = false,
            ClientEvent::Rejected(reason) if on_turn => {
                debug!(reason = %reason, "plan rejected, drawing instead");
                let _ = actions.send(LocalAction::Undo);
                let _ = actions.send(LocalAction::EndTurn);
            }
            ClientEvent::GameOver { .. } | ClientEvent::SessionEnded => return,
            _ => {}
        }
    }
}
