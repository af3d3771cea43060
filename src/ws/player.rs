//! Player message handlers
//!
//! Refused actions get no reply; the broadcasts that follow a successful
//! action are the only feedback clients rely on.

use crate::protocol::ServerMessage;
use crate::state::{AppState, Rejected};
use crate::types::{ClientId, QuestionId};
use std::sync::Arc;

fn log_rejected(client_id: ClientId, action: &str, reason: Rejected) {
    tracing::debug!(
        "Ignored {} from {} [{}]: {}",
        action,
        client_id,
        reason.code(),
        reason
    );
}

pub async fn handle_submit_profile(
    state: &Arc<AppState>,
    client_id: ClientId,
    display_name: String,
    question_ids: Vec<QuestionId>,
    answers: Vec<String>,
) -> Option<ServerMessage> {
    if let Err(e) = state
        .submit_profile(client_id, &display_name, &question_ids, &answers)
        .await
    {
        log_rejected(client_id, "profile", e);
    }
    None
}

pub async fn handle_submit_guess(
    state: &Arc<AppState>,
    client_id: ClientId,
    text: String,
) -> Option<ServerMessage> {
    if let Err(e) = state.submit_guess(client_id, &text).await {
        log_rejected(client_id, "guess", e);
    }
    None
}

pub async fn handle_submit_judgement(
    state: &Arc<AppState>,
    client_id: ClientId,
    is_correct: bool,
) -> Option<ServerMessage> {
    if let Err(e) = state.submit_judgement(client_id, is_correct).await {
        log_rejected(client_id, "judgement", e);
    }
    None
}
