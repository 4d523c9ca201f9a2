use axum::extract::ws;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::bot::{
    BOT_NAME, Bot, BotActions, BotError, BotPlay, BotRequest, BotSettings, CompletionClient,
};
use crate::client::{Client, Liveness};
use crate::error::GameError;
use crate::game_logic::messages::{
    ABORT_GAME, AbortGameEvent, BOT_WAIT, END_TURN, ENTER_ROOM, EXIT_ROOM, Event, GAME_OVER,
    GIVE_CLUE, GUESS_EVENT, GameOverEvent, GiveClueEvent, GuessEvent, INVALID_STATE,
    NEW_GAME, NewGameResponse, ParticipantInfo, RoomChangeEvent, TurnEvent, UPDATE_PARTICIPANT,
};
use crate::game_logic::{Actions, Deck, Game, Role, Team};

pub mod handlers;
pub mod registry;

use handlers::EventHandler;
use registry::Registry;

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub default_room: String,
    pub pong_wait: Duration,
    pub bot: BotSettings,
}

/// Who is acting. Bot actions carry the seat they were requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Player(String),
    Bot { room: String, team: Team, role: Role },
}

impl Origin {
    pub fn player(&self) -> Result<&str, GameError> {
        match self {
            Origin::Player(name) => Ok(name),
            Origin::Bot { .. } => Err(GameError::BadRequest(format!(
                "{BOT_NAME} cannot do that"
            ))),
        }
    }
}

/// The acting participant as seen by a handler.
#[derive(Debug, Clone)]
pub struct Seat {
    pub name: String,
    pub room: String,
    pub team: Team,
    pub role: Role,
    pub game: Option<String>,
    pub is_bot: bool,
}

#[derive(Debug)]
pub enum ManagerMessage {
    ClientConnected {
        username: String,
        outbound: mpsc::Sender<ws::Message>,
        liveness: Liveness,
        respond_to: oneshot::Sender<bool>,
    },
    ClientEvent {
        username: String,
        event: Event,
    },
    ClientDisconnected {
        username: String,
    },
    IsLoggedIn {
        username: String,
        respond_to: oneshot::Sender<bool>,
    },
    BotPlayed {
        room: String,
        turn_id: u64,
        outcome: Result<BotPlay, BotError>,
    },
}

/// Owns every client, chat room and game. Runs inside a single actor task, so each
/// handler sees and mutates state without interleaving.
pub struct Manager {
    clients: Registry<Client>,
    rooms: Registry<BTreeSet<String>>,
    games: Registry<Game>,
    handlers: HashMap<&'static str, EventHandler>,
    words: Arc<Vec<String>>,
    completion: Option<Arc<dyn CompletionClient>>,
    settings: ManagerSettings,
    self_sender: mpsc::Sender<ManagerMessage>,
}

impl Manager {
    pub fn new(
        settings: ManagerSettings,
        words: Arc<Vec<String>>,
        completion: Option<Arc<dyn CompletionClient>>,
        self_sender: mpsc::Sender<ManagerMessage>,
    ) -> Self {
        let mut rooms = Registry::default();
        rooms.insert(settings.default_room.clone(), BTreeSet::new());
        Self {
            clients: Registry::default(),
            rooms,
            games: Registry::default(),
            handlers: handlers::event_handlers(),
            words,
            completion,
            settings,
            self_sender,
        }
    }

    fn handle_message(&mut self, msg: ManagerMessage) {
        match msg {
            ManagerMessage::ClientConnected {
                username,
                outbound,
                liveness,
                respond_to,
            } => {
                let accepted = self.register_client(username, outbound, liveness);
                let _ = respond_to.send(accepted);
            }
            ManagerMessage::ClientEvent { username, event } => {
                self.handle_client_event(username, event);
            }
            ManagerMessage::ClientDisconnected { username } => {
                self.detach_client(&username);
            }
            ManagerMessage::IsLoggedIn {
                username,
                respond_to,
            } => {
                let _ = respond_to.send(self.clients.contains(&username));
            }
            ManagerMessage::BotPlayed {
                room,
                turn_id,
                outcome,
            } => {
                self.handle_bot_played(room, turn_id, outcome);
            }
        }
    }

    fn register_client(
        &mut self,
        username: String,
        outbound: mpsc::Sender<ws::Message>,
        liveness: Liveness,
    ) -> bool {
        if self.clients.contains(&username) {
            tracing::warn!(client.name = %username, "Rejecting duplicate session");
            return false;
        }

        let room = self.settings.default_room.clone();
        self.clients.insert(
            username.clone(),
            Client::new(username.clone(), room.clone(), outbound, liveness),
        );
        self.join_room(&username, &room);
        self.send_room_snapshot(&username);
        tracing::info!(client.name = %username, room = %room, "Client connected");
        true
    }

    fn handle_client_event(&mut self, username: String, event: Event) {
        if !self.clients.contains(&username) {
            tracing::warn!(
                client.name = %username,
                event.kind = %event.kind,
                "Event from unknown client"
            );
            return;
        }

        let origin = Origin::Player(username.clone());
        if let Err(e) = self.route_event(&event, &origin) {
            tracing::warn!(
                client.name = %username,
                event.kind = %event.kind,
                error = %e,
                "Rejected client event"
            );
            self.send_to(
                &username,
                INVALID_STATE,
                &serde_json::json!({ "message": e.to_string() }),
            );
        }
    }

    /// The one path every action, human or bot, goes through.
    pub(crate) fn route_event(&mut self, event: &Event, origin: &Origin) -> Result<(), GameError> {
        let handler = *self
            .handlers
            .get(event.kind.as_str())
            .ok_or_else(|| GameError::UnknownEvent(event.kind.clone()))?;
        tracing::debug!(event.kind = %event.kind, origin = ?origin, "Routing event");
        handler(self, event, origin)
    }

    /// Teardown for a departing session. Safe to call more than once.
    fn detach_client(&mut self, username: &str) {
        if !self.clients.contains(username) {
            tracing::debug!(client.name = %username, "Detach for unknown client ignored");
            return;
        }
        self.leave_game(username);
        self.leave_room(username);
        self.clients.remove(username);
        tracing::info!(client.name = %username, clients = self.clients.len(), "Client detached");
    }

    fn seat(&self, origin: &Origin) -> Result<Seat, GameError> {
        match origin {
            Origin::Player(name) => {
                let client = self
                    .clients
                    .get(name)
                    .ok_or_else(|| GameError::UnknownClient(name.clone()))?;
                Ok(Seat {
                    name: client.username.clone(),
                    room: client.room.clone(),
                    team: client.team,
                    role: client.role,
                    game: client.game.clone(),
                    is_bot: false,
                })
            }
            Origin::Bot { room, team, role } => Ok(Seat {
                name: BOT_NAME.to_string(),
                room: room.clone(),
                team: *team,
                role: *role,
                game: Some(room.clone()),
                is_bot: true,
            }),
        }
    }

    fn active_game_for(&mut self, seat: &Seat) -> Result<&mut Game, GameError> {
        let room = seat.game.as_deref().ok_or(GameError::NotInGame)?;
        let game = self
            .games
            .get_mut(room)
            .ok_or_else(|| GameError::NoGame(room.to_string()))?;
        if !game.is_active() {
            return Err(GameError::GameNotActive);
        }
        Ok(game)
    }

    fn participants(&self, room: &str) -> Vec<ParticipantInfo> {
        self.rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|name| self.clients.get(name))
                    .map(Client::participant)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn send_room_snapshot(&self, username: &str) {
        let Some(client) = self.clients.get(username) else {
            return;
        };
        let room = client.room.clone();
        let snapshot = RoomChangeEvent {
            name: username.to_string(),
            room_name: room.clone(),
            participants: Some(self.participants(&room)),
            game_in_progress: Some(self.games.get(&room).is_some_and(Game::is_active)),
        };
        self.send_to(username, ENTER_ROOM, &snapshot);
    }

    fn join_room(&mut self, username: &str, room: &str) {
        if let Some(client) = self.clients.get_mut(username) {
            client.room = room.to_string();
        }
        let notice = RoomChangeEvent {
            name: username.to_string(),
            room_name: room.to_string(),
            participants: None,
            game_in_progress: None,
        };
        self.notify_room(room, ENTER_ROOM, &notice);
        self.rooms
            .get_or_insert_with(room, BTreeSet::new)
            .insert(username.to_string());
    }

    fn leave_room(&mut self, username: &str) {
        let Some(room) = self.clients.get(username).map(|c| c.room.clone()) else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(username);
        }
        let notice = RoomChangeEvent {
            name: username.to_string(),
            room_name: room.clone(),
            participants: None,
            game_in_progress: None,
        };
        self.notify_room(&room, EXIT_ROOM, &notice);

        let default_room = &self.settings.default_room;
        if self
            .rooms
            .release_if(&room, |members| members.is_empty() && &room != default_room)
            .is_some()
        {
            tracing::debug!(room = %room, "Released empty room");
        }
    }

    fn move_to_room(&mut self, username: &str, target: &str) {
        let current = self.clients.get(username).map(|c| c.room.clone());
        if current.as_deref() != Some(target) {
            self.leave_game(username);
            self.leave_room(username);
            self.join_room(username, target);
            tracing::info!(client.name = %username, room = %target, "Client changed room");
        }
        self.send_room_snapshot(username);
    }

    fn update_participant<F>(&mut self, username: &str, change: F) -> Result<(), GameError>
    where
        F: FnOnce(&mut Client),
    {
        let in_active_game = self
            .clients
            .get(username)
            .and_then(|c| c.game.as_deref())
            .and_then(|room| self.games.get(room))
            .is_some_and(Game::is_active);
        if in_active_game {
            return Err(GameError::GameInProgress);
        }

        let client = self
            .clients
            .get_mut(username)
            .ok_or_else(|| GameError::UnknownClient(username.to_string()))?;
        change(client);
        let info = client.participant();
        let room = client.room.clone();
        self.notify_room(&room, UPDATE_PARTICIPANT, &info);
        Ok(())
    }

    fn start_game(&mut self, username: &str, bots: BotActions) -> Result<(), GameError> {
        let room = self
            .clients
            .get(username)
            .map(|c| c.room.clone())
            .ok_or_else(|| GameError::UnknownClient(username.to_string()))?;

        if self.games.get(&room).is_some_and(Game::is_active) {
            tracing::debug!(room = %room, "Game already running, resending board");
            self.send_board(username, &room);
            return Ok(());
        }
        if bots.any() && self.completion.is_none() {
            return Err(GameError::BotsUnavailable);
        }

        let members: Vec<String> = self
            .rooms
            .get(&room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        let mut actions = Actions::default();
        for client in members.iter().filter_map(|name| self.clients.get(name)) {
            actions.add(client.team, client.role);
        }
        for (team, role) in bots.seats() {
            actions.add(team, role);
        }

        if let Some(finished) = self.games.release_if(&room, |g| !g.is_active()) {
            tracing::debug!(room = %finished.room(), "Retiring finished game");
        }

        let words = &self.words;
        let completion = &self.completion;
        let bot_settings = &self.settings.bot;
        self.games.try_get_or_insert_with(&room, || {
            if actions.active_teams() == 0 || !actions.validate() {
                return Err(GameError::InvalidComposition(actions.describe_unfilled()));
            }
            let deck = Deck::deal_cards(words, &mut rand::thread_rng())?;
            let bot = match completion {
                Some(completion) if bots.any() => Some(Bot::spawn(
                    bots,
                    Arc::clone(completion),
                    bot_settings.clone(),
                )),
                _ => None,
            };
            Ok(Game::new(room.clone(), members.clone(), deck, actions, bot))
        })?;

        for name in &members {
            if let Some(client) = self.clients.get_mut(name) {
                client.game = Some(room.clone());
            }
        }
        tracing::info!(
            room = %room,
            players = members.len(),
            bots = ?bots.seats(),
            "Game started"
        );

        for name in &members {
            self.send_board(name, &room);
        }
        self.schedule_bot_turn(&room);
        Ok(())
    }

    fn send_board(&self, username: &str, room: &str) {
        let (Some(client), Some(game)) = (self.clients.get(username), self.games.get(room)) else {
            return;
        };
        let plays_cluegiver =
            client.role == Role::Cluegiver && client.game.as_deref() == Some(room);
        let cards = if plays_cluegiver {
            game.deck().cluegiver_view()
        } else {
            game.deck().guesser_view()
        };
        let board = NewGameResponse {
            cards,
            team_turn: game.team_turn(),
            role_turn: game.role_turn(),
        };
        self.send_to(username, NEW_GAME, &board);
    }

    /// Removes a player from their game. Returns false if they were not in one.
    fn leave_game(&mut self, username: &str) -> bool {
        let Some(client) = self.clients.get_mut(username) else {
            return false;
        };
        let Some(room) = client.game.take() else {
            return false;
        };
        let team = client.team;
        let role = client.role;

        let Some(game) = self.games.get_mut(&room) else {
            return false;
        };
        game.remove_player(username);
        let was_active = game.is_active();
        if was_active {
            game.release_seat(team, role);
        }

        let notice = AbortGameEvent {
            name: username.to_string(),
            team_color: team,
        };
        self.notify_room(&room, ABORT_GAME, &notice);
        tracing::info!(client.name = %username, room = %room, "Player left game");

        if self.games.release_if(&room, |g| !g.has_players()).is_some() {
            tracing::info!(room = %room, "Last player left, game removed");
            return true;
        }
        if was_active {
            self.revalidate_game(&room);
        }
        true
    }

    fn revalidate_game(&mut self, room: &str) {
        let Some(game) = self.games.get(room) else {
            return;
        };
        let actions = *game.actions();
        if actions.active_teams() == 0 || !actions.validate() {
            tracing::info!(
                room = %room,
                unfilled = %actions.describe_unfilled(),
                "Game can no longer continue"
            );
            self.end_game(room, "Essential roles unfilled. Cannot continue the game.");
            return;
        }
        self.schedule_bot_turn(room);
    }

    fn end_game(&mut self, room: &str, message: &str) {
        let Some(game) = self.games.get_mut(room) else {
            return;
        };
        game.finish();
        let summary = GameOverEvent {
            message: message.to_string(),
            remaining_cards: game.deck().colors(),
        };
        tracing::info!(room = %room, message, "Game over");
        self.notify_room(room, GAME_OVER, &summary);
    }

    /// Hands the turn to the bot if it owns it and is not already working on it.
    fn schedule_bot_turn(&mut self, room: &str) {
        let Some(game) = self.games.get_mut(room) else {
            return;
        };
        if !game.is_active() {
            return;
        }
        let (team, role) = game.turn();
        let Some(bot) = game.bot().filter(|b| b.fills(team, role)).cloned() else {
            return;
        };

        let request = match role {
            Role::Cluegiver => BotRequest::Clue {
                team,
                words: game.deck().clue_words(team),
            },
            Role::Guesser => match game.clue() {
                Some(clue) => BotRequest::Guess {
                    team,
                    clue: clue.clone(),
                    board: game.deck().guess_words(),
                },
                None => {
                    tracing::warn!(
                        room = %room,
                        "Bot guesser has no clue to act on, ending its turn"
                    );
                    let origin = Origin::Bot {
                        room: room.to_string(),
                        team,
                        role,
                    };
                    self.end_bot_turn(&origin);
                    return;
                }
            },
        };

        if !game.mark_bot_pending() {
            tracing::debug!(room = %room, "Bot already working on this turn");
            return;
        }
        let turn_id = game.turn_id();

        let wait = TurnEvent {
            team_turn: team,
            role_turn: role,
        };
        self.notify_game(room, BOT_WAIT, &wait);
        self.extend_client_deadlines();

        tracing::info!(room = %room, team = %team, role = %role, "Bot taking its turn");
        let sender = self.self_sender.clone();
        let room = room.to_string();
        tokio::spawn(async move {
            let outcome = bot.play(request).await;
            if sender
                .send(ManagerMessage::BotPlayed {
                    room,
                    turn_id,
                    outcome,
                })
                .await
                .is_err()
            {
                tracing::warn!("Manager stopped before a bot result could be delivered");
            }
        });
    }

    /// Humans sit idle while the bot thinks; keep their sessions from timing out.
    fn extend_client_deadlines(&self) {
        let until = Instant::now() + self.settings.bot.timeout + self.settings.pong_wait;
        for client in self.clients.values() {
            client.liveness().extend_to(until);
        }
    }

    fn handle_bot_played(
        &mut self,
        room: String,
        turn_id: u64,
        outcome: Result<BotPlay, BotError>,
    ) {
        let Some(game) = self.games.get_mut(&room) else {
            tracing::debug!(room = %room, "Bot result for a game that no longer exists");
            return;
        };
        if !game.is_active() || game.turn_id() != turn_id {
            tracing::debug!(
                room = %room,
                turn_id,
                current = game.turn_id(),
                "Dropping stale bot result"
            );
            return;
        }
        game.clear_bot_pending();
        let (team, role) = game.turn();

        let play = match outcome {
            Ok(play) => play,
            Err(e) => {
                tracing::warn!(room = %room, error = %e, "Bot could not take its turn");
                let message = format!("{BOT_NAME} could not take its turn: {e}");
                self.notify_room(&room, INVALID_STATE, &serde_json::json!({ "message": message }));
                self.end_bot_turn(&Origin::Bot { room, team, role });
                return;
            }
        };

        let origin = Origin::Bot {
            room: room.clone(),
            team: play.team,
            role: play.role,
        };
        match play.event_type {
            GIVE_CLUE => self.play_bot_clue(&origin, play),
            GUESS_EVENT => self.play_bot_guesses(&origin, turn_id, play),
            other => {
                tracing::error!(event.kind = other, "Bot produced an unroutable event");
                self.end_bot_turn(&origin);
            }
        }
    }

    fn play_bot_clue(&mut self, origin: &Origin, play: BotPlay) {
        if play.result.clue.is_empty() {
            tracing::warn!(response = %play.result.response, "No clue found in bot reply");
            self.end_bot_turn(origin);
            return;
        }
        let clue = GiveClueEvent {
            clue: play.result.clue,
            num_cards: play.result.count,
            from: BOT_NAME.to_string(),
            team_color: Some(play.team),
        };
        let routed = Event::new(GIVE_CLUE, &clue)
            .map_err(|source| GameError::BadPayload {
                event: GIVE_CLUE.to_string(),
                source,
            })
            .and_then(|event| self.route_event(&event, origin));
        if let Err(e) = routed {
            tracing::warn!(error = %e, clue = %clue.clue, "Bot clue rejected");
            self.end_bot_turn(origin);
        }
    }

    fn play_bot_guesses(&mut self, origin: &Origin, turn_id: u64, play: BotPlay) {
        let Origin::Bot { room, .. } = origin else {
            return;
        };
        let mut guessed = 0;
        for word in &play.result.candidates {
            if !self.bot_holds_turn(room, turn_id) {
                break;
            }
            let on_board = self
                .games
                .get(room)
                .is_some_and(|g| g.deck().is_unrevealed(word));
            if !on_board {
                tracing::debug!(candidate = %word, "Skipping candidate not on the board");
                continue;
            }
            let guess = GuessEvent {
                guess: word.clone(),
                guesser: BOT_NAME.to_string(),
            };
            let routed = Event::new(GUESS_EVENT, &guess)
                .map_err(|source| GameError::BadPayload {
                    event: GUESS_EVENT.to_string(),
                    source,
                })
                .and_then(|event| self.route_event(&event, origin));
            if let Err(e) = routed {
                tracing::warn!(error = %e, candidate = %word, "Bot guess rejected");
                break;
            }
            guessed += 1;
        }

        if self.bot_holds_turn(room, turn_id) {
            if guessed == 0 {
                tracing::warn!(response = %play.result.response, "Bot reply had no usable guesses");
            }
            self.end_bot_turn(origin);
        }
    }

    fn bot_holds_turn(&self, room: &str, turn_id: u64) -> bool {
        self.games
            .get(room)
            .is_some_and(|g| g.is_active() && g.turn_id() == turn_id)
    }

    fn end_bot_turn(&mut self, origin: &Origin) {
        if let Err(e) = self.route_event(&Event::empty(END_TURN), origin) {
            tracing::warn!(error = %e, "Could not end bot turn");
        }
    }

    fn encode<S: Serialize>(kind: &str, payload: &S) -> Option<ws::Message> {
        match Event::new(kind, payload).and_then(|event| event.to_ws_text()) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::error!(event.kind = kind, error = %e, "Failed to encode event");
                None
            }
        }
    }

    fn deliver<'a, I>(&self, names: I, message: &ws::Message)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for name in names {
            if let Some(client) = self.clients.get(name) {
                client.send(message.clone());
            }
        }
    }

    fn send_to<S: Serialize>(&self, username: &str, kind: &str, payload: &S) {
        if let (Some(client), Some(message)) =
            (self.clients.get(username), Self::encode(kind, payload))
        {
            client.send(message);
        }
    }

    fn notify_room<S: Serialize>(&self, room: &str, kind: &str, payload: &S) {
        if let (Some(members), Some(message)) = (self.rooms.get(room), Self::encode(kind, payload))
        {
            self.deliver(members, &message);
        }
    }

    fn notify_game<S: Serialize>(&self, room: &str, kind: &str, payload: &S) {
        if let (Some(game), Some(message)) = (self.games.get(room), Self::encode(kind, payload)) {
            self.deliver(game.players(), &message);
        }
    }
}

#[tracing::instrument(skip(manager, receiver))]
pub async fn run_manager_actor(mut manager: Manager, mut receiver: mpsc::Receiver<ManagerMessage>) {
    tracing::info!("Manager actor started");
    while let Some(msg) = receiver.recv().await {
        manager.handle_message(msg);
    }
    tracing::info!("Manager actor stopped");
}

#[derive(Clone, Debug)]
pub struct ManagerHandle {
    sender: mpsc::Sender<ManagerMessage>,
}

impl ManagerHandle {
    pub fn spawn(
        buffer_size: usize,
        settings: ManagerSettings,
        words: Arc<Vec<String>>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let manager = Manager::new(settings, words, completion, sender.clone());
        tokio::spawn(run_manager_actor(manager, receiver));
        Self { sender }
    }

    pub async fn client_connected(
        &self,
        username: String,
        outbound: mpsc::Sender<ws::Message>,
        liveness: Liveness,
    ) -> bool {
        let (respond_to, rx) = oneshot::channel();
        if self
            .sender
            .send(ManagerMessage::ClientConnected {
                username,
                outbound,
                liveness,
                respond_to,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn client_event(&self, username: String, event: Event) -> Result<(), String> {
        self.sender
            .send(ManagerMessage::ClientEvent { username, event })
            .await
            .map_err(|e| format!("Failed to send event to manager: {}", e))
    }

    pub async fn client_disconnected(&self, username: String) {
        if self
            .sender
            .send(ManagerMessage::ClientDisconnected {
                username: username.clone(),
            })
            .await
            .is_err()
        {
            tracing::error!(client.name = %username, "Failed to notify manager of disconnect");
        }
    }

    pub async fn is_logged_in(&self, username: String) -> bool {
        let (respond_to, rx) = oneshot::channel();
        if self
            .sender
            .send(ManagerMessage::IsLoggedIn {
                username,
                respond_to,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}
