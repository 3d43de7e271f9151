//! Live WebSocket channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, warn};

use crate::commands;
use crate::events::{ClientCommand, ErrorKind, ServerEvent};
use crate::AppState;

/// Replies queued for one client
const REPLY_CAPACITY: usize = 16;

/// Upgrade to a WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerEvent>(REPLY_CAPACITY);

    for greeting in greetings(&state) {
        let _ = reply_tx.send(greeting).await;
    }
    state.client_connected();

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                Some(reply) = reply_rx.recv() => reply,
                received = events.recv() => match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Client lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let command_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    for reply in handle_text(&command_state, &text).await {
                        if reply_tx.send(reply).await.is_err() {
                            return;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.client_disconnected().await;
}

/// Sent to every new client: current settings, then current door state
fn greetings(state: &AppState) -> [ServerEvent; 2] {
    [
        ServerEvent::Settings(state.detector.settings()),
        ServerEvent::DoorStatus {
            status: state.detector.state(),
        },
    ]
}

async fn handle_text(state: &Arc<AppState>, text: &str) -> Vec<ServerEvent> {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => commands::execute(state, command).await,
        Err(e) => rejection(text, &e).into_iter().collect(),
    }
}

/// Malformed settings are reported back; anything else unparseable is ignored
fn rejection(text: &str, error: &serde_json::Error) -> Option<ServerEvent> {
    let event = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("event")?.as_str().map(str::to_owned));

    match event.as_deref() {
        Some("update_settings") => {
            warn!("Rejected settings update: {}", error);
            Some(ServerEvent::error(
                ErrorKind::SettingsError,
                format!("Invalid settings: {}", error),
            ))
        }
        _ => {
            debug!("Ignoring client message: {}", error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use door_detector::DoorState;

    #[tokio::test]
    async fn test_greetings_carry_settings_then_state() {
        let (state, _door, _desktop) = test_state();
        let [settings, status] = greetings(&state);
        assert_eq!(settings, ServerEvent::Settings(state.detector.settings()));
        assert_eq!(status, ServerEvent::DoorStatus { status: DoorState::Unknown });
    }

    #[tokio::test]
    async fn test_handle_text_updates_settings() {
        let (state, _door, _desktop) = test_state();
        let replies = handle_text(&state, r#"{"event":"update_settings","data":{"threshold":55}}"#).await;
        assert_eq!(replies, vec![ServerEvent::SettingsUpdated { success: true }]);
        assert_eq!(state.detector.settings().threshold, 55);
    }

    #[tokio::test]
    async fn test_malformed_settings_are_reported() {
        let (state, _door, _desktop) = test_state();
        let replies = handle_text(&state, r#"{"event":"update_settings","data":{"threshold":"high"}}"#).await;
        assert!(matches!(
            replies.as_slice(),
            [ServerEvent::ErrorMessage { kind: ErrorKind::SettingsError, .. }]
        ));
        assert_eq!(state.detector.settings().threshold, 30);
    }

    #[tokio::test]
    async fn test_unknown_messages_are_ignored() {
        let (state, _door, _desktop) = test_state();
        assert!(handle_text(&state, r#"{"event":"ping"}"#).await.is_empty());
        assert!(handle_text(&state, "not json").await.is_empty());
    }
}
