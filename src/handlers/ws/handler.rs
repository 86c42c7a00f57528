//! Axum WebSocket handler
//!
//! Upgrades `/listen` connections and bridges the raw socket to the
//! transport-agnostic session pipeline: a reader task feeds inbound frames
//! into the session, a sender task drains the ordered outbound stream back
//! to the socket.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{error, info, warn};

use crate::core::{InboundFrame, OutboundFrame, OutgoingMessage, run_session};
use crate::state::AppState;

/// Buffer sizes for the socket-facing channels. Audio frames arrive at a
/// steady clip, so these are sized above the event channel to keep the
/// socket tasks from stalling the pipeline on short bursts.
const OUTBOUND_BUFFER: usize = 256;
const INBOUND_BUFFER: usize = 256;

/// How long the sender task gets to flush queued frames after the session
/// resolves before it is aborted.
const SENDER_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Conversation WebSocket handler.
/// Upgrades the HTTP connection and runs one full session on it.
pub async fn ws_listen_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("WebSocket listen connection upgrade requested");
    ws.on_upgrade(move |socket| handle_listen_socket(socket, state))
}

/// Manage the entire WebSocket session for one conversation.
async fn handle_listen_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("WebSocket listen connection established");

    let (mut sender, mut receiver) = socket.split();

    let backends = match app_state.session_backends() {
        Ok(backends) => backends,
        Err(e) => {
            error!("Failed to build session backends: {}", e);
            if let Ok(json) = serde_json::to_string(&OutgoingMessage::Error {
                message: "Voice backends unavailable".to_string(),
            }) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            let _ = sender.close().await;
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundFrame>(INBOUND_BUFFER);

    // Drain the ordered outbound stream onto the socket. Interleaving of
    // text and audio is whatever order the pipeline produced.
    let mut sender_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let result = match frame {
                OutboundFrame::Message(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                OutboundFrame::Audio(chunk) => sender.send(Message::Binary(chunk)).await,
            };

            if let Err(e) = result {
                warn!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Forward socket frames into the pipeline. Dropping `inbound_tx` when
    // the socket closes is the end-of-stream signal the session waits on.
    let reader_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    if inbound_tx.send(InboundFrame::Audio(data)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Text(text)) => {
                    if inbound_tx
                        .send(InboundFrame::Text(text.to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed by client");
                    break;
                }
                Ok(_) => {} // ping/pong handled by axum
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    if let Err(e) = run_session(&app_state.config, backends, inbound_rx, outbound_tx).await {
        warn!("Session ended with error: {}", e);
    }

    reader_task.abort();
    if timeout(SENDER_FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
        sender_task.abort();
    }

    info!("WebSocket listen connection finished");
}
