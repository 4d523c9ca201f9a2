use std::time::Duration;
use thiserror::Error;

use crate::game_logic::{Role, Team};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Completion service returned no choices")]
    EmptyResponse,
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("Bot does not play {team} {role}")]
    SeatNotFilled { team: Team, role: Role },
    #[error("Bot worker is no longer running")]
    WorkerGone,
}
