//! WebSocket handler for real-time mixer control.
//!
//! Every connection counts as an attached client of the mixer service for as
//! long as it is open. The server sends `INITIAL_STATE` right after the
//! upgrade and then forwards every broadcast event; clients drive the mixer
//! with `TOGGLE`, `PAUSE_ALL`, `RESUME_ALL` and `STOP_ALL`.

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use serde::{Deserialize, Serialize};

use crate::api::http::{resolve_track, ToggleRequest};
use crate::api::AppState;
use crate::mixer::{MixerSnapshot, ToggleOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming WebSocket message envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsIncoming {
    Toggle { payload: ToggleRequest },
    PauseAll,
    ResumeAll,
    StopAll,
    GetState,
    Heartbeat,
}

/// Outgoing WebSocket messages.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsOutgoing {
    InitialState { payload: MixerSnapshot },
    MixerState { payload: MixerSnapshot },
    ToggleResult { payload: ToggleResultPayload },
    HeartbeatAck,
    Error { message: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleResultPayload {
    id: String,
    outcome: ToggleOutcome,
}

impl WsOutgoing {
    /// Serializes the message to a WebSocket text message.
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|s| Message::Text(s.into()))
    }
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send(sender: &mut WsSender, message: WsOutgoing) -> bool {
    match message.to_message() {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => true,
    }
}

/// Sends an error frame if `result` failed; success is reported through the
/// broadcast channel instead.
async fn send_if_error<T, E: std::fmt::Display>(
    sender: &mut WsSender,
    result: Result<T, E>,
) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            send(
                sender,
                WsOutgoing::Error {
                    message: e.to_string(),
                },
            )
            .await
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Handling
// ─────────────────────────────────────────────────────────────────────────────

/// Handles one client request. Returns false when the socket is gone.
async fn handle_incoming(state: &AppState, sender: &mut WsSender, incoming: WsIncoming) -> bool {
    match incoming {
        WsIncoming::Heartbeat => send(sender, WsOutgoing::HeartbeatAck).await,
        WsIncoming::GetState => {
            let payload = state.broadcaster.current();
            send(sender, WsOutgoing::MixerState { payload }).await
        }
        WsIncoming::Toggle { payload } => {
            let result = match resolve_track(&state.catalog, payload).await {
                Ok(track) => {
                    let id = track.id.clone();
                    state
                        .mixer_service
                        .handle()
                        .await
                        .toggle(track)
                        .await
                        .map(|outcome| ToggleResultPayload { id, outcome })
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(payload) => send(sender, WsOutgoing::ToggleResult { payload }).await,
                Err(message) => send(sender, WsOutgoing::Error { message }).await,
            }
        }
        WsIncoming::PauseAll => {
            let result = state.mixer_service.handle().await.pause_all().await;
            send_if_error(sender, result).await
        }
        WsIncoming::ResumeAll => {
            let result = state.mixer_service.handle().await.resume_all().await;
            send_if_error(sender, result).await
        }
        WsIncoming::StopAll => {
            let result = state.mixer_service.handle().await.stop_all().await;
            send_if_error(sender, result).await
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket connection handler.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut broadcast_rx = state.broadcast_tx.subscribe();
    let mut last_activity = Instant::now();

    let conn_guard = state.ws_manager.register();
    let cancel_token = conn_guard.cancel_token().clone();
    // Detaches from the mixer service when the connection ends.
    let _binding = state.mixer_service.attach().await;

    let (heartbeat_timeout, check_interval) = {
        let config = state.config.read();
        (
            Duration::from_secs(config.ws_heartbeat_timeout_secs),
            Duration::from_secs(config.ws_heartbeat_check_interval_secs),
        )
    };

    let initial = WsOutgoing::InitialState {
        payload: state.broadcaster.current(),
    };
    if !send(&mut sender, initial).await {
        log::warn!(
            "[WS] Failed to send initial state, client {} disconnected",
            conn_guard.id()
        );
        return;
    }

    let mut heartbeat_interval = tokio::time::interval(check_interval);
    heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_guard.id());
                break;
            }
            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsIncoming>(&text) {
                            Ok(incoming) => {
                                if !handle_incoming(&state, &mut sender, incoming).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                log::debug!("[WS] Ignoring unrecognized message: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            Ok(event) = broadcast_rx.recv() => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > heartbeat_timeout {
                    log::warn!("[WS] Heartbeat timeout: {}", conn_guard.id());
                    break;
                }
            }
        }
    }
}
