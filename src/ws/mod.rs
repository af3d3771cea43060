pub mod handlers;
mod host;
mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::key_fingerprint;
use crate::codec::{WireCodec, WireFormat};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ClientId, Role};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
    pub key: Option<String>,
    #[serde(default)]
    pub format: WireFormat,
}

impl WsQuery {
    pub fn role(&self) -> Role {
        match self.role.as_deref() {
            Some("host") => Role::Host,
            Some("display") => Role::Display,
            _ => Role::Player,
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let role = params.role();
    tracing::info!(
        "WebSocket connection request: role={:?}, format={:?}, key={:?}",
        role,
        params.format,
        params.key.as_deref().map(key_fingerprint)
    );

    if role == Role::Host && !state.auth.validate_host_key(params.key.as_deref()) {
        tracing::warn!("Rejected host connection with invalid key");
        return (StatusCode::UNAUTHORIZED, "Invalid host key").into_response();
    }

    let format = params.format;
    ws.on_upgrade(move |socket| handle_socket(socket, role, format, state))
}

/// Encode and send one message. Returns false once the socket is gone.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    codec: &dyn WireCodec,
    msg: &ServerMessage,
) -> bool {
    match codec.encode(msg) {
        Ok(frame) => sender.send(Message::Text(frame.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode {}: {}", msg.tag(), e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, role: Role, format: WireFormat, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let codec = format.codec();
    let client_id: ClientId = state.next_client_id();

    // Subscribe before registering so the join broadcasts reach this client too
    let mut broadcast_rx = state.subscribe();
    let welcome = state.connect(client_id, role).await;
    tracing::info!("Client {} connected as {:?}", client_id, role);

    for msg in &welcome {
        if !send_message(&mut sender, codec.as_ref(), msg).await {
            tracing::error!("Failed to send welcome to {}", client_id);
            state.disconnect(client_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if !send_message(&mut sender, codec.as_ref(), &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Client {} lagged, skipped {} messages", client_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received from {}: {}", client_id, text.as_str());

                        match codec.decode(text.as_str()) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, client_id, role, &state).await
                                {
                                    if !send_message(&mut sender, codec.as_ref(), &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to decode message from {}: {}", client_id, e);
                                let error = ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                );
                                if !send_message(&mut sender, codec.as_ref(), &error).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by client {}", client_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(client_id).await;
    tracing::info!("WebSocket connection closed for client {} ({:?})", client_id, role);
}
