use chrono::Utc;
use std::collections::HashMap;

use super::{Manager, Origin, Seat};
use crate::error::GameError;
use crate::game_logic::deck::normalize_word;
use crate::game_logic::messages::{
    ABORT_GAME, CHANGE_ROLE, CHANGE_TEAM, ChangeRoomRequest, END_TURN, ENTER_ROOM, Event,
    GIVE_CLUE, GUESS_EVENT, GiveClueEvent, GuessEvent, GuessResponse, NEW_GAME, NEW_MESSAGE,
    NewGameRequest, NewMessageEvent, SEND_MESSAGE, SendMessageEvent, TurnEvent,
};
use crate::game_logic::{Game, Role};

pub type EventHandler = fn(&mut Manager, &Event, &Origin) -> Result<(), GameError>;

/// Static routing table from event type to handler.
pub fn event_handlers() -> HashMap<&'static str, EventHandler> {
    let mut table: HashMap<&'static str, EventHandler> = HashMap::new();
    table.insert(SEND_MESSAGE, handle_send_message);
    table.insert(ENTER_ROOM, handle_enter_room);
    table.insert(CHANGE_TEAM, handle_change_team);
    table.insert(CHANGE_ROLE, handle_change_role);
    table.insert(NEW_GAME, handle_new_game);
    table.insert(GIVE_CLUE, handle_give_clue);
    table.insert(GUESS_EVENT, handle_guess);
    table.insert(END_TURN, handle_end_turn);
    table.insert(ABORT_GAME, handle_abort_game);
    table
}

/// The seat must own the current turn, and a bot must actually play that seat.
fn check_turn(game: &Game, seat: &Seat, role: Role) -> Result<(), GameError> {
    let bot_seat_ok = !seat.is_bot || game.bot().is_some_and(|b| b.fills(seat.team, seat.role));
    if seat.role != role || !game.is_turn_of(seat.team, role) || !bot_seat_ok {
        return Err(GameError::NotYourTurn {
            team: game.team_turn(),
            role: game.role_turn(),
        });
    }
    Ok(())
}

fn handle_send_message(
    manager: &mut Manager,
    event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let seat = manager.seat(origin)?;
    let request: SendMessageEvent = event.parse_payload()?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(GameError::BadRequest("Message cannot be empty".to_string()));
    }

    let outgoing = NewMessageEvent {
        message: message.to_string(),
        from: seat.name,
        color: request.color,
        sent_time: Utc::now(),
    };
    manager.notify_room(&seat.room, NEW_MESSAGE, &outgoing);
    Ok(())
}

fn handle_enter_room(
    manager: &mut Manager,
    event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let username = origin.player()?;
    let request: ChangeRoomRequest = event.parse_payload()?;
    let target = request.room_name.trim();
    if target.is_empty() {
        return Err(GameError::BadRequest("Room name cannot be empty".to_string()));
    }
    manager.move_to_room(username, target);
    Ok(())
}

fn handle_change_team(
    manager: &mut Manager,
    _event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let username = origin.player()?;
    manager.update_participant(username, |client| client.team = client.team.change())
}

fn handle_change_role(
    manager: &mut Manager,
    _event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let username = origin.player()?;
    manager.update_participant(username, |client| client.role = client.role.change())
}

fn handle_new_game(
    manager: &mut Manager,
    event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let username = origin.player()?;
    let request: NewGameRequest = if event.payload.is_null() {
        NewGameRequest::default()
    } else {
        event.parse_payload()?
    };
    manager.start_game(username, request.bots)
}

fn handle_give_clue(
    manager: &mut Manager,
    event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let seat = manager.seat(origin)?;
    let request: GiveClueEvent = event.parse_payload()?;
    let clue = request.clue.trim();
    if clue.is_empty() {
        return Err(GameError::EmptyClue);
    }
    if clue.split_whitespace().count() > 1 {
        return Err(GameError::BadRequest("The clue must be a single word".to_string()));
    }

    let game = manager.active_game_for(&seat)?;
    check_turn(game, &seat, Role::Cluegiver)?;
    if game.deck().is_unrevealed(clue) {
        return Err(GameError::ClueOnBoard(clue.to_string()));
    }
    game.give_clue(clue.to_string(), request.num_cards);
    let room = game.room().to_string();

    let outgoing = GiveClueEvent {
        clue: clue.to_string(),
        num_cards: request.num_cards,
        from: seat.name,
        team_color: Some(seat.team),
    };
    tracing::info!(
        room = %room,
        clue = %outgoing.clue,
        num_cards = ?outgoing.num_cards,
        "Clue given"
    );
    manager.notify_game(&room, GIVE_CLUE, &outgoing);
    manager.schedule_bot_turn(&room);
    Ok(())
}

fn handle_guess(
    manager: &mut Manager,
    event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let seat = manager.seat(origin)?;
    let request: GuessEvent = event.parse_payload()?;

    let game = manager.active_game_for(&seat)?;
    check_turn(game, &seat, Role::Guesser)?;
    if game.clue().is_none() {
        return Err(GameError::NoClue);
    }
    let card_color = game.reveal(&request.guess)?;
    let guessing_team = game.team_turn();
    let correct = game.evaluate_guess(card_color);
    let outcome = game.outcome_after(card_color, guessing_team);
    let keeps_turn = game.is_turn_of(guessing_team, Role::Guesser) && game.guess_remaining() > 0;
    let room = game.room().to_string();

    let outgoing = GuessResponse {
        guess: normalize_word(&request.guess),
        guesser: seat.name,
        team_color: seat.team,
        card_color,
        correct,
        team_turn: game.team_turn(),
        role_turn: game.role_turn(),
        guess_remaining: game.guess_remaining(),
        score: game.score(),
    };
    tracing::info!(
        room = %room,
        guess = %outgoing.guess,
        card_color = %card_color,
        correct,
        "Card revealed"
    );
    manager.notify_game(&room, GUESS_EVENT, &outgoing);

    if let Some(message) = outcome.message() {
        manager.end_game(&room, &message);
        return Ok(());
    }
    if !keeps_turn {
        manager.schedule_bot_turn(&room);
    }
    Ok(())
}

fn handle_end_turn(
    manager: &mut Manager,
    _event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let seat = manager.seat(origin)?;
    let game = manager.active_game_for(&seat)?;
    check_turn(game, &seat, game.role_turn())?;
    game.end_turn();

    let turn = TurnEvent {
        team_turn: game.team_turn(),
        role_turn: game.role_turn(),
    };
    let room = game.room().to_string();
    manager.notify_game(&room, END_TURN, &turn);
    manager.schedule_bot_turn(&room);
    Ok(())
}

fn handle_abort_game(
    manager: &mut Manager,
    _event: &Event,
    origin: &Origin,
) -> Result<(), GameError> {
    let username = origin.player()?;
    if !manager.leave_game(username) {
        return Err(GameError::NotInGame);
    }
    Ok(())
}
