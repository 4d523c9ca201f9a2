use serde::Serialize;
use std::collections::BTreeSet;

use super::{CardColor, Deck, Role, Team, UNLIMITED_GUESSES};
use crate::bot::Bot;
use crate::error::GameError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub cluegiver: u32,
    pub guesser: u32,
}

impl RoleCounts {
    pub fn get(&self, role: Role) -> u32 {
        match role {
            Role::Cluegiver => self.cluegiver,
            Role::Guesser => self.guesser,
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut u32 {
        match role {
            Role::Cluegiver => &mut self.cluegiver,
            Role::Guesser => &mut self.guesser,
        }
    }

    pub fn is_present(&self) -> bool {
        self.cluegiver > 0 || self.guesser > 0
    }
}

/// Who fills each seat of each team. Humans and bots both count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Actions {
    pub red: RoleCounts,
    pub blue: RoleCounts,
}

impl Actions {
    pub fn team(&self, team: Team) -> RoleCounts {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut RoleCounts {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }

    pub fn count(&self, team: Team, role: Role) -> u32 {
        self.team(team).get(role)
    }

    pub fn add(&mut self, team: Team, role: Role) {
        *self.team_mut(team).slot_mut(role) += 1;
    }

    pub fn remove(&mut self, team: Team, role: Role) {
        let slot = self.team_mut(team).slot_mut(role);
        *slot = slot.saturating_sub(1);
    }

    pub fn team_present(&self, team: Team) -> bool {
        self.team(team).is_present()
    }

    pub fn active_teams(&self) -> usize {
        Team::ALL.iter().filter(|t| self.team_present(**t)).count()
    }

    /// Seats left empty on a team that otherwise has someone playing.
    pub fn unfilled_roles(&self) -> Vec<(Team, Role)> {
        Team::ALL
            .iter()
            .filter(|team| self.team_present(**team))
            .flat_map(|team| Role::ALL.iter().map(move |role| (*team, *role)))
            .filter(|(team, role)| self.count(*team, *role) == 0)
            .collect()
    }

    pub fn validate(&self) -> bool {
        self.unfilled_roles().is_empty()
    }

    pub fn describe_unfilled(&self) -> String {
        let unfilled = self.unfilled_roles();
        if unfilled.is_empty() {
            return "no team has players".to_string();
        }
        unfilled
            .iter()
            .map(|(team, role)| format!("{team} {role}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub red: u32,
    pub blue: u32,
}

impl Default for Score {
    fn default() -> Self {
        Self { red: 9, blue: 8 }
    }
}

impl Score {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    fn decrement(&mut self, team: Team) {
        let slot = match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        };
        *slot = slot.saturating_sub(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clue {
    pub word: String,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// The team that revealed the death card.
    Lost(Team),
    Won(Team),
}

impl Outcome {
    pub fn message(self) -> Option<String> {
        match self {
            Outcome::Continue => None,
            Outcome::Lost(team) => Some(format!(
                "{} Team uncovers the Black Card. {} Team loses!",
                team.title(),
                team.title()
            )),
            Outcome::Won(team) => Some(format!("{} Team wins!", team.title())),
        }
    }
}

#[derive(Debug)]
pub struct Game {
    room: String,
    players: BTreeSet<String>,
    deck: Deck,
    actions: Actions,
    team_turn: Team,
    role_turn: Role,
    guess_remaining: u32,
    score: Score,
    clue: Option<Clue>,
    bot: Option<Bot>,
    active: bool,
    turn_id: u64,
    bot_pending: Option<u64>,
}

impl Game {
    pub fn new<I>(room: String, players: I, deck: Deck, actions: Actions, bot: Option<Bot>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let team_turn = if actions.team_present(Team::Red) {
            Team::Red
        } else {
            Team::Blue
        };
        Self {
            room,
            players: players.into_iter().collect(),
            deck,
            actions,
            team_turn,
            role_turn: Role::Cluegiver,
            guess_remaining: 0,
            score: Score::default(),
            clue: None,
            bot,
            active: true,
            turn_id: 0,
            bot_pending: None,
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn players(&self) -> impl Iterator<Item = &String> {
        self.players.iter()
    }

    pub fn has_players(&self) -> bool {
        !self.players.is_empty()
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn turn(&self) -> (Team, Role) {
        (self.team_turn, self.role_turn)
    }

    pub fn team_turn(&self) -> Team {
        self.team_turn
    }

    pub fn role_turn(&self) -> Role {
        self.role_turn
    }

    pub fn is_turn_of(&self, team: Team, role: Role) -> bool {
        self.team_turn == team && self.role_turn == role
    }

    pub fn guess_remaining(&self) -> u32 {
        self.guess_remaining
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn clue(&self) -> Option<&Clue> {
        self.clue.as_ref()
    }

    pub fn bot(&self) -> Option<&Bot> {
        self.bot.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bumped on every turn change and every clue.
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    pub fn change_turn(&mut self) {
        self.role_turn = self.role_turn.change();
        if self.role_turn == Role::Cluegiver {
            if self.actions.active_teams() > 1 {
                self.team_turn = self.team_turn.change();
            }
            self.clue = None;
        }
        self.turn_id += 1;
    }

    /// Scores a revealed card against the team whose turn it is.
    pub fn evaluate_guess(&mut self, card_color: CardColor) -> bool {
        if let Some(team) = card_color.team() {
            self.score.decrement(team);
        }

        let correct = card_color.team() == Some(self.team_turn);
        if !correct {
            self.guess_remaining = 0;
        } else if self.guess_remaining < UNLIMITED_GUESSES {
            self.guess_remaining = self.guess_remaining.saturating_sub(1);
        }

        if self.guess_remaining == 0 {
            self.change_turn();
        }
        correct
    }

    pub fn give_clue(&mut self, word: String, count: Option<u32>) {
        self.role_turn = Role::Guesser;
        self.guess_remaining = match count {
            Some(n) if n > 0 => n.saturating_add(1).min(UNLIMITED_GUESSES),
            _ => UNLIMITED_GUESSES,
        };
        self.clue = Some(Clue { word, count });
        self.turn_id += 1;
    }

    pub fn end_turn(&mut self) {
        self.guess_remaining = 0;
        self.change_turn();
    }

    pub fn reveal(&mut self, word: &str) -> Result<CardColor, GameError> {
        self.deck.reveal(word)
    }

    pub fn outcome_after(&self, card_color: CardColor, guessing_team: Team) -> Outcome {
        if card_color == CardColor::Death {
            return Outcome::Lost(guessing_team);
        }
        match card_color.team() {
            Some(team) if self.score.get(team) == 0 => Outcome::Won(team),
            _ => Outcome::Continue,
        }
    }

    pub fn finish(&mut self) {
        self.active = false;
        self.bot_pending = None;
    }

    pub fn remove_player(&mut self, name: &str) -> bool {
        self.players.remove(name)
    }

    pub fn release_seat(&mut self, team: Team, role: Role) {
        self.actions.remove(team, role);
    }

    #[cfg(test)]
    pub fn hand_turn_to(&mut self, team: Team) {
        self.team_turn = team;
        self.role_turn = Role::Cluegiver;
        self.guess_remaining = 0;
        self.clue = None;
        self.turn_id += 1;
    }

    /// Returns false if a bot request for this turn is already in flight.
    pub fn mark_bot_pending(&mut self) -> bool {
        if self.bot_pending == Some(self.turn_id) {
            return false;
        }
        self.bot_pending = Some(self.turn_id);
        true
    }

    pub fn clear_bot_pending(&mut self) {
        self.bot_pending = None;
    }
}
