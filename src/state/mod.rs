pub mod registry;
pub mod round;
pub mod session;

pub use registry::{PlayerRegistry, PlayerState};
pub use round::{RoundState, ScoreDelta};
pub use session::{Effect, Session, SessionSnapshot};

use crate::auth::AuthConfig;
use crate::broadcast::spawn_next_round;
use crate::catalog::QuestionCatalog;
use crate::config::AppConfig;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Why an incoming action was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("sender is not allowed to do that")]
    Unauthorized,
    #[error("action does not fit the current game state")]
    StaleState,
    #[error("action was already taken")]
    DuplicateAction,
}

impl Rejected {
    /// Stable code for logs and the `error` reply to host-only commands.
    /// Player actions that are refused get no reply at all.
    pub fn code(&self) -> &'static str {
        match self {
            Rejected::Unauthorized => "UNAUTHORIZED",
            Rejected::StaleState => "STALE_STATE",
            Rejected::DuplicateAction => "DUPLICATE_ACTION",
        }
    }
}

/// Shared application state
///
/// All mutations go through the session's write lock, and the resulting
/// broadcasts are published before the lock is released. Every client
/// therefore sees state changes in the order they were applied.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    /// Broadcast channel for sending messages to all connected clients
    pub broadcast: broadcast::Sender<ServerMessage>,
    pub auth: Arc<AuthConfig>,
    next_client_id: Arc<AtomicU64>,
    next_round_delay: Duration,
}

impl AppState {
    pub fn new(config: &AppConfig, catalog: QuestionCatalog, auth: AuthConfig) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        let session = Session::new(config.game.clone(), Arc::new(catalog), config.seed);
        tracing::info!("Created session {}", session.id());

        Self {
            session: Arc::new(RwLock::new(session)),
            broadcast: tx,
            auth: Arc::new(auth),
            next_client_id: Arc::new(AtomicU64::new(1)),
            next_round_delay: Duration::from_millis(config.game.next_round_delay_ms),
        }
    }

    /// Hand out a fresh client id, never reused within this process
    pub fn next_client_id(&self) -> ClientId {
        ClientId(self.next_client_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    pub fn next_round_delay(&self) -> Duration {
        self.next_round_delay
    }

    /// Carry out effects. Callers hold the session write guard.
    fn publish(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast(msg) => {
                    tracing::debug!("Broadcasting {}", msg.tag());
                    // No receivers connected is fine
                    let _ = self.broadcast.send(msg);
                }
                Effect::ScheduleNextRound { after_round } => {
                    spawn_next_round(self.clone(), after_round);
                }
            }
        }
    }

    pub async fn open_lobby(&self) {
        let mut session = self.session.write().await;
        let effects = session.open_lobby();
        self.publish(effects);
    }

    /// Register a client. Returns the messages only this client should get.
    pub async fn connect(&self, client_id: ClientId, role: Role) -> Vec<ServerMessage> {
        let mut session = self.session.write().await;
        if role.is_participant() {
            let effects = session.connect(client_id);
            self.publish(effects);
        }
        session.welcome(client_id, role)
    }

    pub async fn disconnect(&self, client_id: ClientId) {
        let mut session = self.session.write().await;
        let effects = session.disconnect(client_id);
        self.publish(effects);
    }

    pub async fn submit_profile(
        &self,
        client_id: ClientId,
        display_name: &str,
        question_ids: &[QuestionId],
        answers: &[String],
    ) -> Result<(), Rejected> {
        let mut session = self.session.write().await;
        let effects = session.submit_profile(client_id, display_name, question_ids, answers)?;
        self.publish(effects);
        Ok(())
    }

    pub async fn submit_guess(&self, client_id: ClientId, text: &str) -> Result<(), Rejected> {
        let mut session = self.session.write().await;
        let effects = session.submit_guess(client_id, text)?;
        self.publish(effects);
        Ok(())
    }

    pub async fn submit_judgement(
        &self,
        client_id: ClientId,
        is_correct: bool,
    ) -> Result<(), Rejected> {
        let mut session = self.session.write().await;
        let effects = session.submit_judgement(client_id, is_correct)?;
        self.publish(effects);
        Ok(())
    }

    pub async fn start_game(&self) {
        let mut session = self.session.write().await;
        let effects = session.start_game();
        self.publish(effects);
    }

    pub async fn skip_round(&self) -> Result<(), Rejected> {
        let mut session = self.session.write().await;
        let effects = session.skip_round()?;
        self.publish(effects);
        Ok(())
    }

    pub async fn end_game(&self) {
        let mut session = self.session.write().await;
        let effects = session.end_game();
        self.publish(effects);
    }

    pub async fn reset_game(&self) {
        let mut session = self.session.write().await;
        let effects = session.reset_game();
        self.publish(effects);
    }

    /// Start the round after `round_no` unless something moved on already
    pub async fn advance_after(&self, round_no: u32) {
        let mut session = self.session.write().await;
        let effects = session.advance_after(round_no);
        self.publish(effects);
    }

    pub async fn phase(&self) -> GamePhase {
        self.session.read().await.phase()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            &AppConfig::default(),
            QuestionCatalog::builtin(),
            AuthConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let config = AppConfig {
            seed: Some(7),
            game: GameConfig {
                next_round_delay_ms: 10,
                ..GameConfig::default()
            },
            ..AppConfig::default()
        };
        AppState::new(&config, QuestionCatalog::builtin(), AuthConfig::default())
    }

    async fn submit(state: &AppState, id: ClientId) {
        state
            .submit_profile(id, "P", &[QuestionId(1)], &["Blue".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_client_ids_are_unique() {
        let state = AppState::default();
        let a = state.next_client_id();
        let b = state.next_client_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_display_is_not_a_player() {
        let state = test_state();
        state.open_lobby().await;

        let welcome = state.connect(ClientId(1), Role::Display).await;
        assert!(matches!(welcome[0], ServerMessage::Welcome { .. }));
        assert!(state.snapshot().await.players.is_empty());
    }

    #[tokio::test]
    async fn test_connect_broadcasts_player_list() {
        let state = test_state();
        state.open_lobby().await;
        let mut rx = state.subscribe();

        state.connect(ClientId(1), Role::Player).await;

        match rx.recv().await.unwrap() {
            ServerMessage::PlayerList { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].display_name, "Player 1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejections_are_returned() {
        let state = test_state();
        state.open_lobby().await;
        state.connect(ClientId(1), Role::Player).await;

        assert_eq!(
            state.submit_guess(ClientId(1), "early").await,
            Err(Rejected::StaleState)
        );
        assert_eq!(state.skip_round().await, Err(Rejected::StaleState));
        assert_eq!(Rejected::StaleState.code(), "STALE_STATE");
    }

    #[tokio::test]
    async fn test_next_round_starts_after_delay() {
        let state = test_state();
        state.open_lobby().await;
        for id in 1..=2 {
            state.connect(ClientId(id), Role::Player).await;
        }
        state.start_game().await;
        submit(&state, ClientId(1)).await;
        submit(&state, ClientId(2)).await;

        let round = state.snapshot().await.round.unwrap();
        assert_eq!(round.number, 1);

        let guesser = if round.target == ClientId(1) {
            ClientId(2)
        } else {
            ClientId(1)
        };
        state.submit_guess(guesser, "Blue").await.unwrap();
        state.submit_judgement(round.target, true).await.unwrap();
        assert_eq!(state.phase().await, GamePhase::ReviewingAnswer);

        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, GamePhase::RoundInProgress);
        assert_eq!(snapshot.round.unwrap().number, 2);
    }
}
