use axum::extract::{
    Query, State,
    ws::{self, WebSocket, WebSocketUpgrade},
};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;

use super::error::{Result as WebResult, WebError};
use crate::client::Liveness;
use crate::game_logic::messages::Event;
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct WsQuery {
    #[serde(default)]
    pub otp: Option<String>,
}

pub async fn ws_handler(
    ws_upgrade: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(app_state): State<AppState>,
) -> WebResult<Response> {
    let token = query
        .otp
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| WebError::Unauthorized("Missing one-time token".to_string()))?;
    let username = app_state.otps.verify(token).ok_or_else(|| {
        tracing::warn!("WebSocket: Rejected unknown or expired token");
        WebError::Unauthorized("Invalid or expired one-time token".to_string())
    })?;

    tracing::info!(client.name = %username, "WebSocket: Upgrading connection");
    let max_message_bytes = app_state.session.max_message_bytes;
    Ok(ws_upgrade
        .max_message_size(max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, app_state, username))
        .into_response())
}

#[tracing::instrument(skip_all, fields(client.name = %username))]
pub async fn handle_socket(socket: WebSocket, app_state: AppState, username: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let session = app_state.session.clone();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ws::Message>(session.outbound_buffer);
    let liveness = Liveness::new(session.pong_wait());

    if !app_state
        .manager
        .client_connected(username.clone(), outbound_tx.clone(), liveness.clone())
        .await
    {
        tracing::warn!("WebSocket: Manager refused session, closing");
        if let Ok(reply) = Event::invalid_state("This user is already connected").to_ws_text() {
            let _ = ws_sender.send(reply).await;
        }
        let _ = ws_sender.close().await;
        return;
    }

    let ping_every = session.ping_interval();
    let mut send_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
        loop {
            tokio::select! {
                queued = outbound_rx.recv() => match queued {
                    Some(message) => {
                        if ws_sender.send(message).await.is_err() {
                            tracing::info!("WS send error, client likely disconnected");
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("Outbound queue closed");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if ws_sender.send(ws::Message::Ping(Default::default())).await.is_err() {
                        tracing::info!("WS ping failed, client likely disconnected");
                        break;
                    }
                }
            }
        }
        tracing::debug!("Send task terminating");
        let _ = ws_sender.close().await;
    }
    .in_current_span());

    let manager = app_state.manager.clone();
    let recv_username = username.clone();
    let reply_tx = outbound_tx;
    let pong_wait = session.pong_wait();
    let mut deadline_rx = liveness.subscribe();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let deadline = *deadline_rx.borrow_and_update();
            tokio::select! {
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(ws::Message::Text(text))) => match Event::from_ws_text(text.as_str()) {
                        Ok(event) => {
                            tracing::debug!(event.kind = %event.kind, "Received event");
                            let forwarded =
                                manager.client_event(recv_username.clone(), event).await;
                            if let Err(e) = forwarded {
                                tracing::error!(error = %e, "Error forwarding event to manager");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Malformed envelope");
                            if let Ok(reply) =
                                Event::invalid_state(format!("Malformed message: {e}")).to_ws_text()
                            {
                                let _ = reply_tx.try_send(reply);
                            }
                        }
                    },
                    Some(Ok(ws::Message::Pong(_))) => {
                        tracing::trace!("Received pong");
                        liveness.refresh(pong_wait);
                    }
                    Some(Ok(ws::Message::Ping(_))) => {
                        tracing::trace!("Received ping, axum answers it");
                    }
                    Some(Ok(ws::Message::Binary(_))) => {
                        tracing::debug!("Received binary message (ignored)");
                    }
                    Some(Ok(ws::Message::Close(_))) => {
                        tracing::info!("WebSocket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket error (recv)");
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                },
                Ok(()) = deadline_rx.changed() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if liveness.deadline() <= Instant::now() {
                        tracing::warn!("Read deadline passed without a pong");
                        break;
                    }
                }
            }
        }
        tracing::debug!("Receive task terminating");
    }
    .in_current_span());

    tokio::select! {
        _ = (&mut send_task) => {
            tracing::debug!("Send task finished, aborting recv task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            tracing::debug!("Recv task finished, aborting send task");
            send_task.abort();
        },
    }

    app_state.manager.client_disconnected(username).await;
    tracing::info!("WebSocket: Client fully disconnected");
}
