use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection identity assigned by the transport. Every value, including 0,
/// is a real client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub i32);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type SessionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    None,
    Lobby,
    ProfileSetup,
    RoundInProgress,
    ReviewingAnswer,
    Results,
}

impl GamePhase {
    /// Whether the session may move from `self` to `to`
    pub fn can_transition_to(&self, to: GamePhase) -> bool {
        use GamePhase::*;

        match (self, to) {
            (None, Lobby) => true,

            // Host start and host reset are allowed from anywhere
            (_, ProfileSetup) => true,
            (_, Lobby) => true,

            (ProfileSetup, RoundInProgress) => true,
            (RoundInProgress, ReviewingAnswer) => true,
            (ReviewingAnswer, RoundInProgress) => true,
            // Skipped or abandoned round
            (RoundInProgress, RoundInProgress) => true,

            (_, Results) => true,

            _ => false,
        }
    }

    /// Whether the game has left the lobby and the catalog is known to clients
    pub fn is_game_running(&self) -> bool {
        matches!(
            self,
            GamePhase::ProfileSetup | GamePhase::RoundInProgress | GamePhase::ReviewingAnswer
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    /// One pre-assigned player guesses the target's answer
    OneGuessesAnother,
    /// Everyone except the target may guess, first answer counts
    EveryoneGuessesOne,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
    /// Shared screen: receives broadcasts, never joins as a player
    Display,
}

impl Role {
    pub fn is_participant(&self) -> bool {
        matches!(self, Role::Host | Role::Player)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub round_time_seconds: f32,
    pub next_round_delay_ms: u64,
    pub max_answer_chars: usize,
    pub max_name_chars: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_time_seconds: 20.0,
            next_round_delay_ms: 4000,
            max_answer_chars: 200,
            max_name_chars: 32,
        }
    }
}
