//! Session orchestration
//!
//! `Session` owns everything mutable about a game: the player registry, the
//! phase, the current round and the used-question pool. It holds no locks
//! itself. Each operation returns the effects (broadcasts, scheduled work) the
//! caller has to carry out, so the caller can run the whole thing under a
//! single write guard.

use super::registry::{clamp_text, PlayerRegistry, PlayerState};
use super::round::{RoundError, RoundStage, RoundState};
use super::Rejected;
use crate::catalog::QuestionCatalog;
use crate::protocol::{ServerMessage, PROTOCOL_VERSION};
use crate::types::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Something the session wants done after an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send to every connected client
    Broadcast(ServerMessage),
    /// Start the next round once the result has been on screen for a while
    ScheduleNextRound { after_round: u32 },
}

/// Read-only view of the session for the host API
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: GamePhase,
    pub round_no: u32,
    pub round: Option<RoundState>,
    pub round_stage: Option<RoundStage>,
    pub players: Vec<PlayerState>,
    pub used_questions: Vec<QuestionId>,
    pub catalog_size: usize,
}

fn server_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct Session {
    id: SessionId,
    config: GameConfig,
    catalog: Arc<QuestionCatalog>,
    registry: PlayerRegistry,
    phase: GamePhase,
    round: Option<RoundState>,
    used_questions: HashSet<QuestionId>,
    round_no: u32,
    rng: StdRng,
}

impl Session {
    pub fn new(config: GameConfig, catalog: Arc<QuestionCatalog>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Self {
            id: ulid::Ulid::new().to_string(),
            config,
            catalog,
            registry: PlayerRegistry::new(),
            phase: GamePhase::None,
            round: None,
            used_questions: HashSet::new(),
            round_no: 0,
            rng,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    pub fn round_no(&self) -> u32 {
        self.round_no
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn used_questions(&self) -> &HashSet<QuestionId> {
        &self.used_questions
    }

    /// Move to `to` and announce it. Refused transitions are logged and
    /// leave the phase untouched.
    fn set_phase(&mut self, to: GamePhase, effects: &mut Vec<Effect>) -> bool {
        if !self.phase.can_transition_to(to) {
            tracing::warn!("Refusing phase transition {:?} -> {:?}", self.phase, to);
            return false;
        }

        tracing::info!("Phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
        effects.push(Effect::Broadcast(ServerMessage::Phase {
            phase: to,
            round_no: self.round_no,
            server_now: server_now(),
        }));
        true
    }

    fn player_list(&self) -> Effect {
        Effect::Broadcast(ServerMessage::PlayerList {
            players: self.registry.summaries(),
        })
    }

    fn profile_progress(&self) -> Effect {
        Effect::Broadcast(ServerMessage::ProfileProgress {
            submitted: self.registry.submitted_count() as u32,
            total: self.registry.len() as u32,
        })
    }

    fn round_announcement(&self, round: &RoundState) -> ServerMessage {
        ServerMessage::RoundStarted {
            round_no: round.number,
            round_type: round.round_type,
            target: round.target,
            guesser: round.designated_guesser,
            question_id: round.question_id,
            question_text: self.catalog.text_of(round.question_id).to_string(),
            round_time_seconds: self.config.round_time_seconds,
        }
    }

    /// The target's stored answer for the round's question
    fn original_answer(&self, round: &RoundState) -> String {
        self.registry
            .get(round.target)
            .map(|p| p.answer_for(round.question_id).to_string())
            .unwrap_or_default()
    }

    fn judgement_request(&self, round: &RoundState) -> Option<ServerMessage> {
        let guess = round.guess.as_ref()?;
        Some(ServerMessage::JudgementRequested {
            target: round.target,
            guesser: guess.guesser,
            question_id: round.question_id,
            question_text: self.catalog.text_of(round.question_id).to_string(),
            original_answer: self.original_answer(round),
            guess_text: guess.text.clone(),
        })
    }

    /// Pick and announce a new round
    fn begin_round(&mut self, effects: &mut Vec<Effect>) -> Result<(), RoundError> {
        let number = self.round_no + 1;
        let candidates = self.registry.ids();
        let round = RoundState::start(
            &mut self.rng,
            number,
            &candidates,
            &self.catalog,
            &mut self.used_questions,
        )?;

        self.round_no = number;
        self.set_phase(GamePhase::RoundInProgress, effects);

        tracing::info!(
            "Round {} started: {:?}, target {}, guesser {:?}, question {}",
            number,
            round.round_type,
            round.target,
            round.designated_guesser,
            round.question_id
        );
        effects.push(Effect::Broadcast(self.round_announcement(&round)));
        self.round = Some(round);
        Ok(())
    }

    /// Start rounds once every registered player has a profile
    fn check_profiles_complete(&mut self, effects: &mut Vec<Effect>) {
        if self.phase != GamePhase::ProfileSetup || !self.registry.all_profiles_submitted() {
            return;
        }

        tracing::info!("All {} profiles submitted", self.registry.len());
        if let Err(e) = self.begin_round(effects) {
            tracing::warn!("Cannot start the first round yet: {}", e);
        }
    }

    /// Open the lobby at startup
    pub fn open_lobby(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.set_phase(GamePhase::Lobby, &mut effects);
        effects
    }

    /// Messages sent directly to a client that just connected
    pub fn welcome(&self, client_id: ClientId, role: Role) -> Vec<ServerMessage> {
        let mut messages = vec![
            ServerMessage::Welcome {
                protocol: PROTOCOL_VERSION.to_string(),
                client_id,
                role,
                phase: self.phase,
                server_now: server_now(),
            },
            ServerMessage::PlayerList {
                players: self.registry.summaries(),
            },
        ];

        if self.phase.is_game_running() {
            messages.push(ServerMessage::QuestionCatalog {
                questions: self.catalog.questions().to_vec(),
            });
        }

        if let Some(round) = &self.round {
            match round.stage() {
                RoundStage::AwaitingGuess => messages.push(self.round_announcement(round)),
                RoundStage::AwaitingJudgement => {
                    messages.push(self.round_announcement(round));
                    messages.extend(self.judgement_request(round));
                }
                RoundStage::Resolved => {}
            }
        }

        messages
    }

    pub fn connect(&mut self, client_id: ClientId) -> Vec<Effect> {
        if !self.registry.on_connect(client_id) {
            tracing::debug!("Client {} already registered", client_id);
            return Vec::new();
        }

        tracing::info!("Player {} connected", client_id);
        let mut effects = vec![self.player_list()];
        if self.phase == GamePhase::ProfileSetup {
            effects.push(self.profile_progress());
        }
        effects
    }

    pub fn disconnect(&mut self, client_id: ClientId) -> Vec<Effect> {
        if self.registry.on_disconnect(client_id).is_none() {
            return Vec::new();
        }

        tracing::info!("Player {} disconnected", client_id);
        let mut effects = vec![self.player_list()];

        match self.phase {
            GamePhase::ProfileSetup => {
                effects.push(self.profile_progress());
                self.check_profiles_complete(&mut effects);
            }
            GamePhase::RoundInProgress | GamePhase::ReviewingAnswer => {
                let abandon = self.round.as_ref().and_then(|round| {
                    if round.resolved {
                        None
                    } else if round.target == client_id {
                        Some((round.number, "target left"))
                    } else if !round.has_guess() && round.designated_guesser == Some(client_id) {
                        Some((round.number, "guesser left"))
                    } else {
                        None
                    }
                });

                if let Some((round_no, reason)) = abandon {
                    tracing::info!("Abandoning round {}: {}", round_no, reason);
                    effects.push(Effect::Broadcast(ServerMessage::RoundAbandoned {
                        round_no,
                        reason: reason.to_string(),
                    }));
                    self.start_next_round_into(&mut effects);
                } else if self.registry.len() < 2 {
                    tracing::info!("Ending game: only {} player left", self.registry.len());
                    self.finish_into(&mut effects);
                }
            }
            _ => {}
        }

        effects
    }

    /// Host: move everyone to profile setup and hand out the questions
    pub fn start_game(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        self.round = None;
        self.round_no = 0;
        self.used_questions.clear();
        self.set_phase(GamePhase::ProfileSetup, &mut effects);

        tracing::info!(
            "Game started with {} players and {} questions",
            self.registry.len(),
            self.catalog.len()
        );
        effects.push(Effect::Broadcast(ServerMessage::QuestionCatalog {
            questions: self.catalog.questions().to_vec(),
        }));
        effects.push(self.profile_progress());

        // Players keep their profiles across games, so a restart may already
        // be complete
        self.check_profiles_complete(&mut effects);
        effects
    }

    pub fn submit_profile(
        &mut self,
        client_id: ClientId,
        display_name: &str,
        question_ids: &[QuestionId],
        answers: &[String],
    ) -> Result<Vec<Effect>, Rejected> {
        let player = self.registry.submit_profile(
            client_id,
            display_name,
            question_ids,
            answers,
            &self.config,
        )?;
        tracing::info!(
            "Player {} submitted profile as {:?} ({} answers)",
            client_id,
            player.display_name,
            player.profile_answers.len()
        );

        let mut effects = vec![self.player_list(), self.profile_progress()];
        self.check_profiles_complete(&mut effects);
        Ok(effects)
    }

    pub fn submit_guess(&mut self, sender: ClientId, text: &str) -> Result<Vec<Effect>, Rejected> {
        if self.phase != GamePhase::RoundInProgress {
            return Err(Rejected::StaleState);
        }
        if !self.registry.contains(sender) {
            return Err(Rejected::Unauthorized);
        }

        let text = clamp_text(text, self.config.max_answer_chars);
        let round = self.round.as_mut().ok_or(Rejected::StaleState)?;
        round.submit_guess(sender, text)?;
        tracing::info!("Round {}: guess accepted from {}", round.number, sender);

        let mut effects = Vec::new();
        self.set_phase(GamePhase::ReviewingAnswer, &mut effects);
        if let Some(request) = self.round.as_ref().and_then(|r| self.judgement_request(r)) {
            effects.push(Effect::Broadcast(request));
        }
        Ok(effects)
    }

    pub fn submit_judgement(
        &mut self,
        sender: ClientId,
        is_correct: bool,
    ) -> Result<Vec<Effect>, Rejected> {
        if self.phase != GamePhase::ReviewingAnswer {
            return Err(Rejected::StaleState);
        }

        let round = self.round.as_mut().ok_or(Rejected::StaleState)?;
        let delta = round.submit_judgement(sender, is_correct)?;
        let round = round.clone();

        self.registry.award(&delta);
        tracing::info!(
            "Round {} judged {} by {}",
            round.number,
            if is_correct { "correct" } else { "wrong" },
            sender
        );

        let guess_text = round
            .guess
            .as_ref()
            .map(|g| g.text.clone())
            .unwrap_or_default();

        Ok(vec![
            Effect::Broadcast(ServerMessage::JudgementAnnouncement {
                is_correct,
                question_id: round.question_id,
                question_text: self.catalog.text_of(round.question_id).to_string(),
                original_answer: self.original_answer(&round),
                guess_text,
            }),
            Effect::Broadcast(ServerMessage::RoundResult {
                is_correct,
                player_scores: self.registry.summaries(),
            }),
            Effect::ScheduleNextRound {
                after_round: round.number,
            },
        ])
    }

    fn start_next_round_into(&mut self, effects: &mut Vec<Effect>) {
        if let Err(e) = self.begin_round(effects) {
            tracing::info!("Ending game: {}", e);
            self.finish_into(effects);
        }
    }

    /// Start the next round, or end the game if too few players are left
    pub fn start_next_round(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.start_next_round_into(&mut effects);
        effects
    }

    /// Delayed continuation after a judgement. Does nothing if round
    /// `round_no` is no longer the current resolved round.
    pub fn advance_after(&mut self, round_no: u32) -> Vec<Effect> {
        let still_current = self.phase == GamePhase::ReviewingAnswer
            && self
                .round
                .as_ref()
                .is_some_and(|r| r.number == round_no && r.resolved);

        if !still_current {
            tracing::debug!("Skipping stale next-round trigger for round {}", round_no);
            return Vec::new();
        }
        self.start_next_round()
    }

    /// Host: give up on the current round and start another
    pub fn skip_round(&mut self) -> Result<Vec<Effect>, Rejected> {
        if !matches!(
            self.phase,
            GamePhase::RoundInProgress | GamePhase::ReviewingAnswer
        ) {
            return Err(Rejected::StaleState);
        }

        let mut effects = Vec::new();
        if let Some(round) = &self.round {
            tracing::info!("Host skipped round {}", round.number);
            effects.push(Effect::Broadcast(ServerMessage::RoundAbandoned {
                round_no: round.number,
                reason: "skipped by host".to_string(),
            }));
        }
        self.start_next_round_into(&mut effects);
        Ok(effects)
    }

    fn finish_into(&mut self, effects: &mut Vec<Effect>) {
        self.round = None;
        self.set_phase(GamePhase::Results, effects);
        effects.push(Effect::Broadcast(ServerMessage::GameOver {
            standings: self.registry.standings(),
        }));
    }

    /// Host: show final standings
    pub fn end_game(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.finish_into(&mut effects);
        effects
    }

    /// Host: back to the lobby with a clean slate, players stay connected
    pub fn reset_game(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        self.round = None;
        self.round_no = 0;
        self.used_questions.clear();
        self.registry.reset_progress();
        self.set_phase(GamePhase::Lobby, &mut effects);
        effects.push(self.player_list());

        tracing::info!("Game reset");
        effects
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut used_questions: Vec<_> = self.used_questions.iter().copied().collect();
        used_questions.sort();

        SessionSnapshot {
            session_id: self.id.clone(),
            phase: self.phase,
            round_no: self.round_no,
            round: self.round.clone(),
            round_stage: self.round.as_ref().map(RoundState::stage),
            players: self
                .registry
                .ids()
                .into_iter()
                .filter_map(|id| self.registry.get(id).cloned())
                .collect(),
            used_questions,
            catalog_size: self.catalog.len(),
        }
    }
}
