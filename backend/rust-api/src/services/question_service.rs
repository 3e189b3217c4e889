use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::errors::GameError;
use crate::models::{GameMode, Question};
use crate::store::GameStore;

/// Question Set Provider: picks the question set a new session plays.
pub struct QuestionService {
    store: Arc<dyn GameStore>,
}

impl QuestionService {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Category given (story progression): stable ascending-id order.
    /// No category: shuffled mix across categories. Either way the set is
    /// truncated to the mode's question count, and an empty pool refuses to
    /// start a session.
    pub async fn select_questions(
        &self,
        mode: GameMode,
        category_id: Option<&str>,
    ) -> Result<Vec<Question>, GameError> {
        let mut questions = self.store.list_questions(category_id).await?;

        if category_id.is_some() {
            questions.sort_by(|a, b| a.id.cmp(&b.id));
        } else {
            questions.shuffle(&mut rand::rng());
        }
        questions.truncate(mode.question_count());

        if questions.is_empty() {
            tracing::warn!(
                mode = mode.as_str(),
                category = ?category_id,
                "No questions available"
            );
            return Err(GameError::NoQuestionsAvailable);
        }

        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Question};
    use crate::store::MemoryStore;

    fn question(id: &str, category: Option<&str>) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer_index: 0,
            difficulty: Difficulty::Easy,
            category_id: category.map(|c| c.to_string()),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn category_selection_is_id_ordered() {
        let store = Arc::new(MemoryStore::new());
        store.seed_questions(vec![
            question("q3", Some("history")),
            question("q1", Some("history")),
            question("q2", Some("history")),
            question("q9", Some("science")),
        ]);

        let service = QuestionService::new(store);
        let selected = service
            .select_questions(GameMode::Story, Some("history"))
            .await
            .unwrap();

        let ids: Vec<&str> = selected.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn mixed_selection_truncates_to_mode_count() {
        let store = Arc::new(MemoryStore::new());
        store.seed_questions((0..30).map(|i| question(&format!("q{:02}", i), None)).collect());

        let service = QuestionService::new(store);
        let selected = service
            .select_questions(GameMode::Classic, None)
            .await
            .unwrap();
        assert_eq!(selected.len(), 10);
    }

    #[tokio::test]
    async fn empty_pool_refuses_session() {
        let store = Arc::new(MemoryStore::new());
        let service = QuestionService::new(store);
        let err = service
            .select_questions(GameMode::Classic, Some("no-such-category"))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NoQuestionsAvailable));
    }

    #[tokio::test]
    async fn inactive_questions_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut inactive = question("q1", None);
        inactive.is_active = false;
        store.seed_questions(vec![inactive]);

        let service = QuestionService::new(store);
        let err = service
            .select_questions(GameMode::Classic, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NoQuestionsAvailable));
    }
}
