use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod client;
mod config;
mod error;
mod game_logic;
mod manager;
mod otp;
mod state;
mod web;
mod words;

use crate::bot::{BotSettings, CompletionClient, OpenAiCompletionClient};
use crate::config::load_settings;
use crate::error::{ConfigError, Result as AppResult};
use crate::manager::{ManagerHandle, ManagerSettings};
use crate::otp::OtpStore;
use crate::state::AppState;
use crate::web::run_server;
use crate::words::load_word_list;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_settings = load_settings()?;
    tracing::info!("Configuration loaded: {:?}", app_settings);

    let words = Arc::new(load_word_list(&app_settings.game.word_list).await?);

    let completion: Option<Arc<dyn CompletionClient>> = match &app_settings.bot.api_key {
        Some(key) if app_settings.bots_enabled() => {
            let client: Arc<dyn CompletionClient> = Arc::new(
                OpenAiCompletionClient::new(&app_settings.bot, key.trim().to_string())
                    .map_err(|e| ConfigError::InvalidValue(format!("bot client: {e}")))?,
            );
            tracing::info!(model = %app_settings.bot.model, "Bot players enabled");
            Some(client)
        }
        _ => {
            tracing::info!("No bot.api_key configured, bot players disabled");
            None
        }
    };

    let session = Arc::new(app_settings.session.clone());
    let manager = ManagerHandle::spawn(
        32,
        ManagerSettings {
            default_room: app_settings.game.default_room.clone(),
            pong_wait: session.pong_wait(),
            bot: BotSettings {
                timeout: app_settings.bot.timeout(),
                log_responses: app_settings.bot.log_responses,
            },
        },
        words,
        completion,
    );

    let otps = OtpStore::new(session.otp_retention());
    let _sweeper = otps.spawn_sweeper(session.otp_sweep_interval());

    let app_state = AppState {
        manager,
        otps,
        session,
    };

    run_server(app_state, app_settings.server).await?;

    Ok(())
}
