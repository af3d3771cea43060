//! Host-only command handlers
//!
//! Authorization is checked in the main dispatch layer before calling these.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;

pub async fn handle_start_game(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host starting game");
    state.start_game().await;
    None
}

pub async fn handle_skip_round(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host skipping round");
    if let Err(e) = state.skip_round().await {
        tracing::debug!("Nothing to skip [{}]: {}", e.code(), e);
    }
    None
}

pub async fn handle_end_game(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host ending game");
    state.end_game().await;
    None
}

pub async fn handle_reset_game(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host resetting game");
    state.reset_game().await;
    None
}
