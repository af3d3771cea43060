//! WebSocket message dispatch
//!
//! Host authorization is checked here, then messages go to the role-specific
//! handler modules. The sender id always comes from the connection.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, Rejected};
use crate::types::{ClientId, Role};
use std::sync::Arc;

use super::{host, player};

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($role:expr, $action:expr) => {
        if $role != Role::Host {
            return Some(ServerMessage::error(
                Rejected::Unauthorized.code(),
                format!("Only host can {}", $action),
            ));
        }
    };
}

/// Handle a client message and return an optional direct response
pub async fn handle_message(
    msg: ClientMessage,
    client_id: ClientId,
    role: Role,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::SubmitProfile {
            display_name,
            question_ids,
            answers,
        } => {
            player::handle_submit_profile(state, client_id, display_name, question_ids, answers)
                .await
        }

        ClientMessage::SubmitGuess { text } => {
            player::handle_submit_guess(state, client_id, text).await
        }

        ClientMessage::SubmitJudgement { is_correct } => {
            player::handle_submit_judgement(state, client_id, is_correct).await
        }

        // Host-only commands
        ClientMessage::HostStartGame => {
            check_host!(role, "start the game");
            host::handle_start_game(state).await
        }

        ClientMessage::HostSkipRound => {
            check_host!(role, "skip rounds");
            host::handle_skip_round(state).await
        }

        ClientMessage::HostEndGame => {
            check_host!(role, "end the game");
            host::handle_end_game(state).await
        }

        ClientMessage::HostResetGame => {
            check_host!(role, "reset the game");
            host::handle_reset_game(state).await
        }
    }
}
