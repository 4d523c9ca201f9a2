use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

use super::error::{Result as WebResult, WebError};
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub otp: String,
    pub message: String,
}

pub fn validate_username(username: &str) -> Result<(), WebError> {
    if username.is_empty() {
        return Err(WebError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(WebError::BadRequest(
            "Username cannot contain whitespace".to_string(),
        ));
    }
    Ok(())
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> WebResult<Json<LoginResponse>> {
    tracing::info!(client.name = %payload.username, "HTTP: Received login request");
    validate_username(&payload.username)?;

    if app_state
        .manager
        .is_logged_in(payload.username.clone())
        .await
    {
        tracing::warn!(client.name = %payload.username, "Login refused, user already connected");
        return Err(WebError::Conflict(format!(
            "User '{}' is already logged in",
            payload.username
        )));
    }

    let otp = app_state.otps.issue(&payload.username);
    Ok(Json(LoginResponse {
        otp,
        message: format!("Welcome, {}", payload.username),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(matches!(validate_username(""), Err(WebError::BadRequest(_))));
        assert!(matches!(
            validate_username("alice smith"),
            Err(WebError::BadRequest(_))
        ));
        assert!(matches!(
            validate_username("alice\t"),
            Err(WebError::BadRequest(_))
        ));
    }
}
