use axum::extract::ws;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::{CardColor, Role, Score, Team};
use crate::bot::BotActions;
use crate::error::GameError;

pub const SEND_MESSAGE: &str = "send_message";
pub const NEW_MESSAGE: &str = "new_message";
pub const ENTER_ROOM: &str = "enter_room";
pub const EXIT_ROOM: &str = "exit_room";
pub const CHANGE_TEAM: &str = "change_team";
pub const CHANGE_ROLE: &str = "change_role";
pub const UPDATE_PARTICIPANT: &str = "update_participant";
pub const NEW_GAME: &str = "new_game";
pub const GIVE_CLUE: &str = "give_clue";
pub const GUESS_EVENT: &str = "guess_event";
pub const END_TURN: &str = "end_turn";
pub const ABORT_GAME: &str = "abort_game";
pub const BOT_WAIT: &str = "bot_wait";
pub const GAME_OVER: &str = "game_over";
pub const INVALID_STATE: &str = "invalid_state";

/// The `{type, payload}` envelope used in both directions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: JsonValue,
}

impl Event {
    pub fn new<S: Serialize>(kind: &str, payload: &S) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn empty(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            payload: JsonValue::Null,
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self {
            kind: INVALID_STATE.to_string(),
            payload: serde_json::json!({ "message": message.into() }),
        }
    }

    pub fn from_ws_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_ws_text(&self) -> Result<ws::Message, serde_json::Error> {
        serde_json::to_string(self).map(|json_string| ws::Message::Text(json_string.into()))
    }

    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, GameError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| GameError::BadPayload {
            event: self.kind.clone(),
            source,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SendMessageEvent {
    pub message: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageEvent {
    pub message: String,
    pub from: String,
    pub color: String,
    pub sent_time: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoomRequest {
    pub room_name: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ParticipantInfo {
    pub name: String,
    #[serde(rename = "teamColor")]
    pub team_color: Team,
    pub role: Role,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomChangeEvent {
    pub name: String,
    pub room_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<ParticipantInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_in_progress: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewGameRequest {
    #[serde(default)]
    pub bots: BotActions,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewGameResponse {
    pub cards: BTreeMap<String, String>,
    pub team_turn: Team,
    pub role_turn: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GiveClueEvent {
    pub clue: String,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    pub num_cards: Option<u32>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub team_color: Option<Team>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GuessEvent {
    pub guess: String,
    #[serde(default)]
    pub guesser: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GuessResponse {
    pub guess: String,
    pub guesser: String,
    pub team_color: Team,
    pub card_color: CardColor,
    pub correct: bool,
    pub team_turn: Team,
    pub role_turn: Role,
    pub guess_remaining: u32,
    pub score: Score,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TurnEvent {
    pub team_turn: Team,
    pub role_turn: Role,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AbortGameEvent {
    pub name: String,
    pub team_color: Team,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameOverEvent {
    pub message: String,
    pub remaining_cards: BTreeMap<String, CardColor>,
}

/// Browsers send the count as the raw input value, so accept a number, a numeric
/// string, or nothing at all.
fn deserialize_optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => match n.as_i64() {
            Some(n) if n <= 0 => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| D::Error::custom("numCards out of range")),
            None => Err(D::Error::custom("numCards must be an integer")),
        },
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(|n| u32::try_from(n).ok().filter(|n| *n > 0))
                .map_err(|_| D::Error::custom(format!("numCards '{s}' is not a number")))
        }
        _ => Err(D::Error::custom("numCards must be a number or string")),
    }
}
