use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::GameError;
use crate::metrics::GAMES_TOTAL;
use crate::models::{
    AnswerRecord, GameMode, GameSession, QuestionView, SessionStatus, StartGameResponse,
};
use crate::store::GameStore;

use super::question_service::QuestionService;

pub struct SessionService {
    store: Arc<dyn GameStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Starts a game: picks the question set and persists the session
    /// header plus one empty answer slot per question as a single unit, so
    /// a half-created session can never be observed.
    pub async fn create_session(
        &self,
        user_id: &str,
        mode: GameMode,
        category_id: Option<&str>,
    ) -> Result<StartGameResponse, GameError> {
        let questions = QuestionService::new(self.store.clone())
            .select_questions(mode, category_id)
            .await?;

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let session = GameSession {
            id: session_id.clone(),
            user_id: user_id.to_string(),
            game_mode: mode,
            category_id: category_id.map(|c| c.to_string()),
            status: SessionStatus::InProgress,
            score: 0,
            correct_answers: 0,
            total_questions: questions.len() as u32,
            xp_earned: 0,
            coins_earned: 0,
            started_at: now,
            completed_at: None,
        };

        let answers: Vec<AnswerRecord> = questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                AnswerRecord::placeholder(
                    &session_id,
                    &question.id,
                    index as u32 + 1,
                    question.difficulty,
                )
            })
            .collect();

        self.store.insert_session(&session, &answers).await?;

        GAMES_TOTAL
            .with_label_values(&[mode.as_str(), "created"])
            .inc();

        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            mode = mode.as_str(),
            questions = session.total_questions,
            "Game session created"
        );

        Ok(StartGameResponse {
            session_id,
            game_mode: mode,
            category_id: session.category_id.clone(),
            total_questions: session.total_questions,
            status: session.status,
            started_at: now,
        })
    }

    /// Ownership is checked on every access: a session belonging to another
    /// user is indistinguishable from a missing one.
    pub async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<GameSession, GameError> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or(GameError::SessionNotFound)?;

        if session.user_id != user_id {
            tracing::warn!(
                session_id = %session_id,
                user_id = %user_id,
                "Session access denied: wrong owner"
            );
            return Err(GameError::SessionNotFound);
        }

        Ok(session)
    }

    /// The assigned questions in play order, without correct answers.
    pub async fn get_session_questions(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<QuestionView>, GameError> {
        let _session = self.get_session(session_id, user_id).await?;
        let answers = self.store.fetch_answers(session_id).await?;

        let ids: Vec<String> = answers.iter().map(|a| a.question_id.clone()).collect();
        let questions = self.store.fetch_questions(&ids).await?;
        let by_id: HashMap<&str, &crate::models::Question> =
            questions.iter().map(|q| (q.id.as_str(), q)).collect();

        let views = answers
            .iter()
            .filter_map(|record| {
                by_id.get(record.question_id.as_str()).map(|question| QuestionView {
                    question_id: question.id.clone(),
                    question_order: record.question_order,
                    text: question.text.clone(),
                    options: question.options.clone(),
                    difficulty: question.difficulty,
                    is_answered: record.is_answered(),
                })
            })
            .collect();

        Ok(views)
    }
}
