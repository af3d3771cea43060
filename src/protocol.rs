use crate::types::*;
use serde::{Deserialize, Serialize};

/// Version carried by every JSON frame (`"v"`)
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Profile answers as parallel lists; the server pairs them up to the
    /// shorter length
    SubmitProfile {
        display_name: String,
        #[serde(default)]
        question_ids: Vec<QuestionId>,
        #[serde(default)]
        answers: Vec<String>,
    },
    SubmitGuess {
        text: String,
    },
    SubmitJudgement {
        is_correct: bool,
    },
    // Host-only messages
    HostStartGame,
    /// Abandon a stalled round and start the next one
    HostSkipRound,
    HostEndGame,
    HostResetGame,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        client_id: ClientId,
        role: Role,
        phase: GamePhase,
        server_now: String,
    },
    PlayerList {
        players: Vec<PlayerSummary>,
    },
    /// Sent when the host starts the game
    QuestionCatalog {
        questions: Vec<Question>,
    },
    ProfileProgress {
        submitted: u32,
        total: u32,
    },
    Phase {
        phase: GamePhase,
        round_no: u32,
        server_now: String,
    },
    RoundStarted {
        round_no: u32,
        round_type: RoundType,
        target: ClientId,
        /// Absent for `everyone_guesses_one` until someone buzzes in
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guesser: Option<ClientId>,
        question_id: QuestionId,
        question_text: String,
        round_time_seconds: f32,
    },
    /// A guess was accepted; the target now has to judge it
    JudgementRequested {
        target: ClientId,
        guesser: ClientId,
        question_id: QuestionId,
        question_text: String,
        original_answer: String,
        guess_text: String,
    },
    JudgementAnnouncement {
        is_correct: bool,
        question_id: QuestionId,
        question_text: String,
        original_answer: String,
        guess_text: String,
    },
    RoundResult {
        is_correct: bool,
        player_scores: Vec<PlayerSummary>,
    },
    RoundAbandoned {
        round_no: u32,
        reason: String,
    },
    GameOver {
        standings: Vec<PlayerSummary>,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }

    /// The `t` tag this message is sent with
    pub fn tag(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::PlayerList { .. } => "player_list",
            ServerMessage::QuestionCatalog { .. } => "question_catalog",
            ServerMessage::ProfileProgress { .. } => "profile_progress",
            ServerMessage::Phase { .. } => "phase",
            ServerMessage::RoundStarted { .. } => "round_started",
            ServerMessage::JudgementRequested { .. } => "judgement_requested",
            ServerMessage::JudgementAnnouncement { .. } => "judgement_announcement",
            ServerMessage::RoundResult { .. } => "round_result",
            ServerMessage::RoundAbandoned { .. } => "round_abandoned",
            ServerMessage::GameOver { .. } => "game_over",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Public per-player entry of the player list and scoreboards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSummary {
    pub client_id: ClientId,
    pub display_name: String,
    pub score: u32,
}
