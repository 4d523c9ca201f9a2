use serde::{Deserialize, Serialize};
use std::fmt;

pub mod deck;
pub mod game;
pub mod messages;

pub use deck::{CardColor, Deck};
pub use game::{Actions, Clue, Game, Score};

/// Board size, and the sentinel for "no limit" on guesses.
pub const TOTAL_CARDS: usize = 25;
pub const UNLIMITED_GUESSES: u32 = TOTAL_CARDS as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    pub fn change(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }

    /// Capitalized form used in game-over announcements.
    pub fn title(self) -> &'static str {
        match self {
            Team::Red => "Red",
            Team::Blue => "Blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Cluegiver,
    Guesser,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Cluegiver, Role::Guesser];

    pub fn change(self) -> Self {
        match self {
            Role::Cluegiver => Role::Guesser,
            Role::Guesser => Role::Cluegiver,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Cluegiver => "cluegiver",
            Role::Guesser => "guesser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
