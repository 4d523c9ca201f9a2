use axum::extract::ws;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::game_logic::messages::ParticipantInfo;
use crate::game_logic::{Role, Team};

/// Read deadline shared between a session's reader and the manager.
#[derive(Debug, Clone)]
pub struct Liveness {
    deadline: Arc<watch::Sender<Instant>>,
}

impl Liveness {
    pub fn new(timeout: Duration) -> Self {
        let (deadline, _) = watch::channel(Instant::now() + timeout);
        Self {
            deadline: Arc::new(deadline),
        }
    }

    /// Moves the deadline to `at` unless it is already later.
    pub fn extend_to(&self, at: Instant) {
        self.deadline.send_if_modified(|current| {
            if at > *current {
                *current = at;
                true
            } else {
                false
            }
        });
    }

    pub fn refresh(&self, timeout: Duration) {
        self.extend_to(Instant::now() + timeout);
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Instant> {
        self.deadline.subscribe()
    }
}

#[derive(Debug)]
pub struct Client {
    pub username: String,
    pub team: Team,
    pub role: Role,
    pub room: String,
    /// Room name of the game this client plays in.
    pub game: Option<String>,
    outbound: mpsc::Sender<ws::Message>,
    liveness: Liveness,
}

impl Client {
    pub fn new(
        username: String,
        room: String,
        outbound: mpsc::Sender<ws::Message>,
        liveness: Liveness,
    ) -> Self {
        Self {
            username,
            team: Team::Red,
            role: Role::Guesser,
            room,
            game: None,
            outbound,
            liveness,
        }
    }

    /// Queues a frame without waiting; a full queue drops the frame.
    pub fn send(&self, message: ws::Message) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    client.name = %self.username,
                    "Outbound queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client.name = %self.username, "Outbound queue closed");
                false
            }
        }
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn participant(&self) -> ParticipantInfo {
        ParticipantInfo {
            name: self.username.clone(),
            team_color: self.team,
            role: self.role,
        }
    }
}
