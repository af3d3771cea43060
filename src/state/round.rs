//! Round state machine
//!
//! A round picks a target, maybe a guesser, and a question, then accepts
//! exactly one guess and exactly one judgement. Scoring is handed back to the
//! caller as a `ScoreDelta`; this module never touches the registry.

use super::Rejected;
use crate::catalog::QuestionCatalog;
use crate::types::{ClientId, QuestionId, RoundType};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// Points for a correct guess
pub const GUESSER_POINTS: u32 = 2;
/// Points for the target when someone knew them well enough
pub const TARGET_POINTS: u32 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoundError {
    #[error("A round needs at least two players, have {0}")]
    NotEnoughPlayers(usize),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStage {
    AwaitingGuess,
    AwaitingJudgement,
    Resolved,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Guess {
    pub guesser: ClientId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ScoreAward {
    pub client_id: ClientId,
    pub points: u32,
}

/// Score changes produced by a judgement
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ScoreDelta {
    pub awards: Vec<ScoreAward>,
}

impl ScoreDelta {
    pub fn is_empty(&self) -> bool {
        self.awards.is_empty()
    }

    pub fn points_for(&self, client_id: ClientId) -> u32 {
        self.awards
            .iter()
            .filter(|a| a.client_id == client_id)
            .map(|a| a.points)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundState {
    pub number: u32,
    pub round_type: RoundType,
    pub target: ClientId,
    /// Fixed at start for `OneGuessesAnother`, never set otherwise
    pub designated_guesser: Option<ClientId>,
    pub question_id: QuestionId,
    pub guess: Option<Guess>,
    pub resolved: bool,
}

/// Pick a question not yet used in this cycle. When every question has been
/// used the pool is cleared and the whole catalog is eligible again.
pub fn pick_question<R: Rng + ?Sized>(
    rng: &mut R,
    catalog: &QuestionCatalog,
    used: &mut HashSet<QuestionId>,
) -> QuestionId {
    let mut available: Vec<QuestionId> = catalog.ids().filter(|id| !used.contains(id)).collect();
    if available.is_empty() {
        tracing::debug!("Question pool exhausted, starting a new cycle");
        used.clear();
        available = catalog.ids().collect();
    }

    // The catalog is never empty (validated on construction)
    let chosen = available[rng.random_range(0..available.len())];
    used.insert(chosen);
    chosen
}

impl RoundState {
    /// A round with explicitly chosen parameters
    pub fn new(
        number: u32,
        round_type: RoundType,
        target: ClientId,
        designated_guesser: Option<ClientId>,
        question_id: QuestionId,
    ) -> Self {
        Self {
            number,
            round_type,
            target,
            designated_guesser,
            question_id,
            guess: None,
            resolved: false,
        }
    }

    /// Randomly pick round type, target, guesser and question
    pub fn start<R: Rng + ?Sized>(
        rng: &mut R,
        number: u32,
        candidates: &[ClientId],
        catalog: &QuestionCatalog,
        used_questions: &mut HashSet<QuestionId>,
    ) -> Result<Self, RoundError> {
        let distinct: HashSet<_> = candidates.iter().collect();
        if distinct.len() < 2 {
            return Err(RoundError::NotEnoughPlayers(distinct.len()));
        }

        let round_type = if rng.random_bool(0.5) {
            RoundType::OneGuessesAnother
        } else {
            RoundType::EveryoneGuessesOne
        };

        let target = *candidates
            .choose(rng)
            .ok_or(RoundError::NotEnoughPlayers(0))?;

        let designated_guesser = match round_type {
            RoundType::OneGuessesAnother => {
                // Terminates: there are at least two distinct candidates
                let guesser = loop {
                    let pick = candidates[rng.random_range(0..candidates.len())];
                    if pick != target {
                        break pick;
                    }
                };
                Some(guesser)
            }
            RoundType::EveryoneGuessesOne => None,
        };

        let question_id = pick_question(rng, catalog, used_questions);

        Ok(Self::new(
            number,
            round_type,
            target,
            designated_guesser,
            question_id,
        ))
    }

    pub fn stage(&self) -> RoundStage {
        if self.resolved {
            RoundStage::Resolved
        } else if self.guess.is_some() {
            RoundStage::AwaitingJudgement
        } else {
            RoundStage::AwaitingGuess
        }
    }

    pub fn has_guess(&self) -> bool {
        self.guess.is_some()
    }

    /// Whoever guessed, or the designated guesser before that
    pub fn guesser(&self) -> Option<ClientId> {
        self.guess
            .as_ref()
            .map(|g| g.guesser)
            .or(self.designated_guesser)
    }

    /// Register a guess. Only the first acceptable guess is kept.
    pub fn submit_guess(&mut self, sender: ClientId, text: String) -> Result<(), Rejected> {
        if self.resolved {
            return Err(Rejected::StaleState);
        }

        // The target may never guess their own answer
        if sender == self.target {
            return Err(Rejected::Unauthorized);
        }

        if self.round_type == RoundType::OneGuessesAnother
            && self.designated_guesser != Some(sender)
        {
            return Err(Rejected::Unauthorized);
        }

        if self.guess.is_some() {
            return Err(Rejected::DuplicateAction);
        }

        self.guess = Some(Guess {
            guesser: sender,
            text,
        });
        Ok(())
    }

    /// Resolve the round. Only the target may judge, and only once.
    pub fn submit_judgement(
        &mut self,
        sender: ClientId,
        is_correct: bool,
    ) -> Result<ScoreDelta, Rejected> {
        if sender != self.target {
            return Err(Rejected::Unauthorized);
        }
        if self.resolved {
            return Err(Rejected::DuplicateAction);
        }
        let Some(guess) = &self.guess else {
            return Err(Rejected::StaleState);
        };

        self.resolved = true;

        if !is_correct {
            return Ok(ScoreDelta::default());
        }

        Ok(ScoreDelta {
            awards: vec![
                ScoreAward {
                    client_id: guess.guesser,
                    points: GUESSER_POINTS,
                },
                ScoreAward {
                    client_id: self.target,
                    points: TARGET_POINTS,
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Question;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn catalog(n: i32) -> QuestionCatalog {
        QuestionCatalog::new(
            (1..=n)
                .map(|id| Question {
                    id: QuestionId(id),
                    text: format!("Question {}", id),
                })
                .collect(),
        )
        .unwrap()
    }

    fn players(ids: &[u64]) -> Vec<ClientId> {
        ids.iter().copied().map(ClientId).collect()
    }

    fn one_guesses_another() -> RoundState {
        RoundState::new(
            1,
            RoundType::OneGuessesAnother,
            ClientId(1),
            Some(ClientId(2)),
            QuestionId(1),
        )
    }

    fn everyone_guesses_one() -> RoundState {
        RoundState::new(
            1,
            RoundType::EveryoneGuessesOne,
            ClientId(1),
            None,
            QuestionId(1),
        )
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut used = HashSet::new();

        let result = RoundState::start(&mut rng, 1, &players(&[1]), &catalog(3), &mut used);
        assert_eq!(result.unwrap_err(), RoundError::NotEnoughPlayers(1));

        let result = RoundState::start(&mut rng, 1, &[], &catalog(3), &mut used);
        assert_eq!(result.unwrap_err(), RoundError::NotEnoughPlayers(0));
        assert!(used.is_empty());
    }

    #[test]
    fn test_target_never_guesser() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = players(&[0, 1, 2]);
        let catalog = catalog(5);
        let mut used = HashSet::new();

        for n in 0..500 {
            let round = RoundState::start(&mut rng, n, &candidates, &catalog, &mut used).unwrap();
            assert!(candidates.contains(&round.target));
            assert_eq!(round.stage(), RoundStage::AwaitingGuess);
            match round.round_type {
                RoundType::OneGuessesAnother => {
                    let guesser = round.designated_guesser.unwrap();
                    assert_ne!(guesser, round.target);
                    assert!(candidates.contains(&guesser));
                }
                RoundType::EveryoneGuessesOne => assert!(round.designated_guesser.is_none()),
            }
        }
    }

    #[test]
    fn test_both_round_types_occur() {
        let mut rng = StdRng::seed_from_u64(99);
        let candidates = players(&[1, 2]);
        let catalog = catalog(3);
        let mut used = HashSet::new();

        let mut seen = HashSet::new();
        for n in 0..200 {
            let round = RoundState::start(&mut rng, n, &candidates, &catalog, &mut used).unwrap();
            seen.insert(format!("{:?}", round.round_type));
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_questions_do_not_repeat_within_cycle() {
        let mut rng = StdRng::seed_from_u64(3);
        let catalog = catalog(6);
        let mut used = HashSet::new();

        for _cycle in 0..4 {
            let mut this_cycle = HashSet::new();
            for _ in 0..catalog.len() {
                let id = pick_question(&mut rng, &catalog, &mut used);
                assert!(this_cycle.insert(id), "question {} repeated", id);
            }
            assert_eq!(this_cycle.len(), catalog.len());
        }
    }

    #[test]
    fn test_pool_resets_after_exhaustion() {
        let mut rng = StdRng::seed_from_u64(11);
        let catalog = catalog(2);
        let mut used = HashSet::new();

        let first = pick_question(&mut rng, &catalog, &mut used);
        let second = pick_question(&mut rng, &catalog, &mut used);
        assert_ne!(first, second);

        let third = pick_question(&mut rng, &catalog, &mut used);
        assert!(third == first || third == second);
        assert_eq!(used.len(), 1);
    }

    #[test]
    fn test_single_question_catalog_repeats() {
        let mut rng = StdRng::seed_from_u64(5);
        let catalog = catalog(1);
        let mut used = HashSet::new();

        for _ in 0..3 {
            assert_eq!(pick_question(&mut rng, &catalog, &mut used), QuestionId(1));
        }
    }

    #[test]
    fn test_designated_guesser_only() {
        let mut round = one_guesses_another();

        assert_eq!(
            round.submit_guess(ClientId(1), "Blue".into()),
            Err(Rejected::Unauthorized)
        );
        assert_eq!(
            round.submit_guess(ClientId(3), "Blue".into()),
            Err(Rejected::Unauthorized)
        );
        assert_eq!(round.submit_guess(ClientId(2), "Blue".into()), Ok(()));
        assert_eq!(
            round.submit_guess(ClientId(2), "Green".into()),
            Err(Rejected::DuplicateAction)
        );

        let guess = round.guess.as_ref().unwrap();
        assert_eq!(guess.text, "Blue");
        assert_eq!(round.stage(), RoundStage::AwaitingJudgement);
    }

    #[test]
    fn test_first_guess_wins() {
        let mut round = everyone_guesses_one();
        assert_eq!(round.guesser(), None);
        assert!(!round.has_guess());

        assert_eq!(
            round.submit_guess(ClientId(1), "Mine".into()),
            Err(Rejected::Unauthorized)
        );
        assert_eq!(round.submit_guess(ClientId(3), "Blue".into()), Ok(()));
        assert_eq!(
            round.submit_guess(ClientId(2), "Red".into()),
            Err(Rejected::DuplicateAction)
        );

        assert_eq!(round.guesser(), Some(ClientId(3)));
        assert_eq!(round.guess.as_ref().unwrap().text, "Blue");
    }

    #[test]
    fn test_client_zero_can_guess() {
        let mut round = RoundState::new(
            1,
            RoundType::EveryoneGuessesOne,
            ClientId(5),
            None,
            QuestionId(1),
        );
        assert_eq!(round.submit_guess(ClientId(0), "Tea".into()), Ok(()));
        assert_eq!(round.guesser(), Some(ClientId(0)));
        assert!(round.has_guess());

        let delta = round.submit_judgement(ClientId(5), true).unwrap();
        assert_eq!(delta.points_for(ClientId(0)), GUESSER_POINTS);
    }

    #[test]
    fn test_judgement_only_by_target() {
        let mut round = one_guesses_another();
        round.submit_guess(ClientId(2), "Blue".into()).unwrap();

        assert_eq!(
            round.submit_judgement(ClientId(2), true),
            Err(Rejected::Unauthorized)
        );
        assert!(!round.resolved);
    }

    #[test]
    fn test_judgement_requires_guess() {
        let mut round = one_guesses_another();
        assert_eq!(
            round.submit_judgement(ClientId(1), true),
            Err(Rejected::StaleState)
        );
        assert!(!round.resolved);
    }

    #[test]
    fn test_correct_judgement_scores() {
        let mut round = one_guesses_another();
        round.submit_guess(ClientId(2), "Blue".into()).unwrap();

        let delta = round.submit_judgement(ClientId(1), true).unwrap();
        assert_eq!(delta.points_for(ClientId(2)), 2);
        assert_eq!(delta.points_for(ClientId(1)), 1);
        assert_eq!(delta.points_for(ClientId(3)), 0);
        assert_eq!(round.stage(), RoundStage::Resolved);
    }

    #[test]
    fn test_wrong_judgement_scores_nothing() {
        let mut round = everyone_guesses_one();
        round.submit_guess(ClientId(2), "Red".into()).unwrap();

        let delta = round.submit_judgement(ClientId(1), false).unwrap();
        assert!(delta.is_empty());
        assert!(round.resolved);
    }

    #[test]
    fn test_resolves_at_most_once() {
        let mut round = one_guesses_another();
        round.submit_guess(ClientId(2), "Blue".into()).unwrap();

        assert!(round.submit_judgement(ClientId(1), false).is_ok());
        for _ in 0..3 {
            assert_eq!(
                round.submit_judgement(ClientId(1), true),
                Err(Rejected::DuplicateAction)
            );
        }
        assert_eq!(
            round.submit_guess(ClientId(2), "Again".into()),
            Err(Rejected::StaleState)
        );
    }
}
