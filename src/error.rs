use thiserror::Error;

use crate::game_logic::{Role, Team};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("Word list configuration error: {0}")]
    Config(String),
    #[error("Failed to read word list from {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch word list from {url}: {source}")]
    HttpFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Word list is empty")]
    Empty,
}

/// Reasons an event handler refuses an action. None of these mutate state.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Malformed '{event}' payload: {source}")]
    BadPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unknown event type '{0}'")]
    UnknownEvent(String),
    #[error("Unknown client '{0}'")]
    UnknownClient(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("No game in room '{0}'")]
    NoGame(String),
    #[error("You are not part of a game")]
    NotInGame,
    #[error("The game is over")]
    GameNotActive,
    #[error("It is the {team} {role}'s turn")]
    NotYourTurn { team: Team, role: Role },
    #[error("'{0}' is not on the board")]
    WordNotOnBoard(String),
    #[error("'{0}' has already been revealed")]
    CardAlreadyRevealed(String),
    #[error("Wait for a clue before guessing")]
    NoClue,
    #[error("The clue cannot be empty")]
    EmptyClue,
    #[error("'{0}' is on the board and cannot be used as a clue")]
    ClueOnBoard(String),
    #[error(
        "Essential roles unfilled: {0}. Need a guesser and a cluegiver per team, and at least one team. Cannot start game."
    )]
    InvalidComposition(String),
    #[error("Team and role cannot change while a game is in progress")]
    GameInProgress,
    #[error("Automated players are not configured on this server")]
    BotsUnavailable,
    #[error("Word list has {available} distinct words, {required} are needed")]
    NotEnoughWords { available: usize, required: usize },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Word list error: {0}")]
    WordList(#[from] WordListError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
