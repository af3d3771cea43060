//! Question catalog
//!
//! The ordered `(id, text)` list every round draws its question from.
//! Loaded once at startup and shared read-only afterwards.

use crate::types::{Question, QuestionId};
use std::collections::HashSet;
use std::path::Path;

/// Text reported for an id the catalog does not contain
pub const UNKNOWN_QUESTION_TEXT: &str = "Unknown question";

/// Env var pointing at a JSON question file
pub const QUESTIONS_FILE_ENV: &str = "KNOWME_QUESTIONS_FILE";

const BUILTIN_QUESTIONS: &[(i32, &str)] = &[
    (1, "Favorite color"),
    (2, "Favorite food"),
    (3, "Dream travel destination"),
    (4, "First concert you went to"),
    (5, "Most-used app on your phone"),
    (6, "Go-to karaoke song"),
    (7, "Favorite movie"),
    (8, "Childhood pet's name"),
    (9, "Least favorite chore"),
    (10, "Ideal Sunday morning"),
    (11, "Hidden talent"),
    (12, "Coffee or tea?"),
];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid question file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Question catalog is empty")]
    Empty,

    #[error("Duplicate question id {0}")]
    DuplicateId(QuestionId),

    #[error("Question {0} has no text")]
    BlankText(QuestionId),
}

#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    /// Build a catalog, keeping the given order
    pub fn new(questions: Vec<Question>) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for q in &questions {
            if !seen.insert(q.id) {
                return Err(CatalogError::DuplicateId(q.id));
            }
            if q.text.trim().is_empty() {
                return Err(CatalogError::BlankText(q.id));
            }
        }

        Ok(Self { questions })
    }

    /// Load a JSON array of `{ "id": .., "text": .. }` objects
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let questions: Vec<Question> = serde_json::from_str(&raw)?;
        Self::new(questions)
    }

    pub fn builtin() -> Self {
        Self {
            questions: BUILTIN_QUESTIONS
                .iter()
                .map(|(id, text)| Question {
                    id: QuestionId(*id),
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    /// Load the catalog named by `KNOWME_QUESTIONS_FILE`, falling back to the
    /// built-in set when unset or unreadable
    pub fn from_env() -> Self {
        let Some(path) = std::env::var(QUESTIONS_FILE_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        else {
            tracing::info!("Using built-in question catalog");
            return Self::builtin();
        };

        match Self::load(&path) {
            Ok(catalog) => {
                tracing::info!("Loaded {} questions from {}", catalog.len(), path);
                catalog
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load questions from {}: {}. Using built-in catalog.",
                    path,
                    e
                );
                Self::builtin()
            }
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.questions.iter().map(|q| q.id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn text_of(&self, id: QuestionId) -> &str {
        self.get(id)
            .map(|q| q.text.as_str())
            .unwrap_or(UNKNOWN_QUESTION_TEXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn q(id: i32, text: &str) -> Question {
        Question {
            id: QuestionId(id),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = QuestionCatalog::builtin();
        assert!(QuestionCatalog::new(builtin.questions().to_vec()).is_ok());
        assert_eq!(builtin.text_of(QuestionId(1)), "Favorite color");
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(
            QuestionCatalog::new(vec![]),
            Err(CatalogError::Empty)
        ));
        assert!(matches!(
            QuestionCatalog::new(vec![q(1, "a"), q(1, "b")]),
            Err(CatalogError::DuplicateId(QuestionId(1)))
        ));
        assert!(matches!(
            QuestionCatalog::new(vec![q(4, "  ")]),
            Err(CatalogError::BlankText(QuestionId(4)))
        ));
    }

    #[test]
    fn test_unknown_question_text() {
        let catalog = QuestionCatalog::new(vec![q(7, "Favorite movie")]).unwrap();
        assert_eq!(catalog.text_of(QuestionId(7)), "Favorite movie");
        assert_eq!(catalog.text_of(QuestionId(8)), UNKNOWN_QUESTION_TEXT);
    }

    #[test]
    fn test_load_keeps_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 30, "text": "Pizza | pasta; or both"}}, {{"id": 10, "text": "Cats or dogs"}}]"#
        )
        .unwrap();

        let catalog = QuestionCatalog::load(file.path()).unwrap();
        let ids: Vec<_> = catalog.ids().collect();
        assert_eq!(ids, vec![QuestionId(30), QuestionId(10)]);
        assert_eq!(catalog.text_of(QuestionId(30)), "Pizza | pasta; or both");
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            QuestionCatalog::load(file.path()),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_to_builtin() {
        std::env::set_var(QUESTIONS_FILE_ENV, "/definitely/not/here.json");
        let catalog = QuestionCatalog::from_env();
        std::env::remove_var(QUESTIONS_FILE_ENV);

        assert_eq!(catalog.len(), QuestionCatalog::builtin().len());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": 1, "text": "Only question"}}]"#).unwrap();

        std::env::set_var(QUESTIONS_FILE_ENV, file.path());
        let catalog = QuestionCatalog::from_env();
        std::env::remove_var(QUESTIONS_FILE_ENV);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.text_of(QuestionId(1)), "Only question");
    }
}
