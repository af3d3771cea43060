use super::round::ScoreDelta;
use super::Rejected;
use crate::protocol::PlayerSummary;
use crate::types::{ClientId, GameConfig, QuestionId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Authoritative state of one connected player
#[derive(Debug, Clone, Serialize)]
pub struct PlayerState {
    pub client_id: ClientId,
    pub display_name: String,
    pub profile_answers: HashMap<QuestionId, String>,
    pub score: u32,
    pub has_submitted_profile: bool,
}

impl PlayerState {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            display_name: default_display_name(client_id),
            profile_answers: HashMap::new(),
            score: 0,
            has_submitted_profile: false,
        }
    }

    /// The stored answer for a question, empty if the player never gave one
    pub fn answer_for(&self, question_id: QuestionId) -> &str {
        self.profile_answers
            .get(&question_id)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            client_id: self.client_id,
            display_name: self.display_name.clone(),
            score: self.score,
        }
    }
}

pub fn default_display_name(client_id: ClientId) -> String {
    format!("Player {}", client_id)
}

/// Trim and cap user-supplied text at `max_chars` characters
pub(crate) fn clamp_text(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

/// Connected players keyed by client id (iteration is in id order)
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: BTreeMap<ClientId, PlayerState>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client with default state. Returns false if it was
    /// already registered (nothing changes in that case).
    pub fn on_connect(&mut self, client_id: ClientId) -> bool {
        if self.players.contains_key(&client_id) {
            return false;
        }
        self.players.insert(client_id, PlayerState::new(client_id));
        true
    }

    pub fn on_disconnect(&mut self, client_id: ClientId) -> Option<PlayerState> {
        self.players.remove(&client_id)
    }

    /// Store a player's profile. Answers are paired with question ids up to
    /// the shorter of the two lists.
    pub fn submit_profile(
        &mut self,
        client_id: ClientId,
        display_name: &str,
        question_ids: &[QuestionId],
        answers: &[String],
        config: &GameConfig,
    ) -> Result<&PlayerState, Rejected> {
        let player = self
            .players
            .get_mut(&client_id)
            .ok_or(Rejected::Unauthorized)?;

        player.display_name = clamp_text(display_name, config.max_name_chars);

        player.profile_answers = question_ids
            .iter()
            .zip(answers)
            .map(|(id, answer)| (*id, clamp_text(answer, config.max_answer_chars)))
            .collect();
        player.has_submitted_profile = true;

        Ok(player)
    }

    /// Re-scans the current registry on every call
    pub fn all_profiles_submitted(&self) -> bool {
        self.players.values().all(|p| p.has_submitted_profile)
    }

    pub fn submitted_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.has_submitted_profile)
            .count()
    }

    pub fn get(&self, client_id: ClientId) -> Option<&PlayerState> {
        self.players.get(&client_id)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.players.contains_key(&client_id)
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.players.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Apply a judgement's score delta. Players who left in the meantime
    /// are skipped.
    pub fn award(&mut self, delta: &ScoreDelta) {
        for award in &delta.awards {
            match self.players.get_mut(&award.client_id) {
                Some(player) => player.score = player.score.saturating_add(award.points),
                None => tracing::debug!(
                    "Skipping {} points for departed player {}",
                    award.points,
                    award.client_id
                ),
            }
        }
    }

    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.players.values().map(PlayerState::summary).collect()
    }

    /// Summaries sorted by score, highest first (ties by id)
    pub fn standings(&self) -> Vec<PlayerSummary> {
        let mut standings = self.summaries();
        standings.sort_by(|a, b| b.score.cmp(&a.score).then(a.client_id.cmp(&b.client_id)));
        standings
    }

    /// Back to a fresh session: scores and profiles cleared, names kept
    pub fn reset_progress(&mut self) {
        for player in self.players.values_mut() {
            player.score = 0;
            player.profile_answers.clear();
            player.has_submitted_profile = false;
        }
    }
}
