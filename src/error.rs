use crate::player::PeerId;
use thiserror::Error;

/// Reasons the host (or a client, locally) refuses an action.
///
/// The `Display` text is what gets sent back to the requester in an `error`
/// message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("no game is running")]
    GameNotRunning,

    #[error("a game is already in progress")]
    GameInProgress,

    #[error("it is {expected}'s turn, not {got}'s")]
    NotYourTurn { expected: PeerId, got: PeerId },

    #[error("request was for turn {got}, current turn is {expected}")]
    StaleTurn { expected: u64, got: u64 },

    #[error("the tiles on the board do not form valid runs and groups")]
    InvalidBoard,

    #[error("initial meld totals {sum}, at least {required} is required")]
    InitialMeldTooLow { sum: u32, required: u32 },

    #[error("placed tiles are not in your hand")]
    TilesNotInHand,

    #[error("tiles already on the board cannot be taken back")]
    BoardTilesRemoved,

    #[error("the room is full")]
    RoomFull,

    #[error("a player with id {0} is already connected")]
    PeerIdTaken(PeerId),

    #[error("at least {required} players are needed to start")]
    NotEnoughPlayers { required: usize },

    #[error("unknown player {0}")]
    UnknownPlayer(PeerId),

    #[error("only the host can do that")]
    NotHost,

    #[error("cell ({x}, {y}) is already occupied")]
    CellOccupied { x: i32, y: i32 },

    #[error("cell ({x}, {y}) is empty")]
    EmptyCell { x: i32, y: i32 },

    #[error("only tiles placed this turn can return to your hand")]
    TileLocked,

    #[error("no tile at hand position {0}")]
    NoSuchHandTile(usize),

    #[error("two tiles share cell ({x}, {y})")]
    DuplicateCoordinate { x: i32, y: i32 },

    #[error("malformed tile in request")]
    MalformedTile,
}

impl GameError {
    /// Replays and late requests are dropped without telling the sender.
    pub fn is_silent(&self) -> bool {
        matches!(self, GameError::StaleTurn { .. } | GameError::GameNotRunning)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link to {0} is closed")]
    Closed(PeerId),

    #[error("bad frame: {0}")]
    Codec(#[from] serde_json::Error),
}
