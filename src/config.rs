use crate::game::Rules;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "rummikub", version, about = "Plays a local Rummikub match between automatic players")]
pub struct Config {
    /// Seats at the table, host included
    #[arg(long, env = "RUMMIKUB_PLAYERS", default_value_t = 4, value_parser = clap::value_parser!(u8).range(2..=4))]
    pub players: u8,

    /// Seed for the deck and turn-order shuffles
    #[arg(long, env = "RUMMIKUB_SEED")]
    pub seed: Option<u64>,

    #[arg(long, env = "RUMMIKUB_TURN_SECONDS", default_value_t = 60)]
    pub turn_seconds: u64,

    /// Stop the demo after this many turns even without a winner
    #[arg(long, env = "RUMMIKUB_MAX_TURNS", default_value_t = 300)]
    pub max_turns: usize,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log: String,
}

impl Config {
    pub fn rules(&self) -> Rules {
        Rules {
            turn_timeout: Duration::from_secs(self.turn_seconds.max(1)),
            ..Rules::default()
        }
    }
}
