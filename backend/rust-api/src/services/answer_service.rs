use std::sync::Arc;

use chrono::Utc;

use crate::errors::GameError;
use crate::metrics::ANSWERS_SUBMITTED_TOTAL;
use crate::models::{SessionStatus, SubmitAnswerRequest, SubmitAnswerResponse};
use crate::store::{GameStore, RecordedAnswer};

use super::locks::KeyedLocks;
use super::rewards;
use super::session_service::SessionService;

/// Answer Evaluator: checks one submitted answer against the session state
/// and fills the matching answer slot, exactly once.
pub struct AnswerService {
    store: Arc<dyn GameStore>,
    session_locks: Arc<KeyedLocks>,
}

impl AnswerService {
    pub fn new(store: Arc<dyn GameStore>, session_locks: Arc<KeyedLocks>) -> Self {
        Self {
            store,
            session_locks,
        }
    }

    pub async fn submit_answer(
        &self,
        session_id: &str,
        user_id: &str,
        req: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, GameError> {
        // Serialized with other submissions and the completion call for
        // this session.
        let _guard = self.session_locks.acquire(session_id).await;

        let session = SessionService::new(self.store.clone())
            .get_session(session_id, user_id)
            .await?;
        if session.status != SessionStatus::InProgress {
            // Finalized sessions are no longer accessible to the evaluator.
            return Err(GameError::SessionNotFound);
        }

        let answers = self.store.fetch_answers(session_id).await?;
        let slot = answers
            .iter()
            .find(|a| a.question_id == req.question_id)
            .ok_or(GameError::QuestionNotInSession)?;
        if slot.is_answered() {
            return Err(GameError::QuestionAlreadyAnswered);
        }

        let question = self
            .store
            .fetch_questions(std::slice::from_ref(&req.question_id))
            .await?
            .into_iter()
            .next()
            .ok_or(GameError::QuestionNotInSession)?;

        let is_correct = req.answer_index == question.correct_answer_index;
        let points_earned = rewards::answer_points(slot.difficulty, is_correct, req.time_to_answer);

        let recorded = RecordedAnswer {
            answer_index: req.answer_index,
            is_correct,
            time_to_answer: req.time_to_answer,
            answered_at: Utc::now(),
        };
        // The conditional write backs up the lock: if it lost anyway, the
        // slot was taken and this submission must fail, not overwrite.
        let won = self
            .store
            .record_answer(session_id, &req.question_id, &recorded)
            .await?;
        if !won {
            return Err(GameError::QuestionAlreadyAnswered);
        }

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if is_correct { "true" } else { "false" }])
            .inc();

        tracing::info!(
            session_id = %session_id,
            question_id = %req.question_id,
            correct = is_correct,
            points = points_earned,
            "Answer recorded"
        );

        Ok(SubmitAnswerResponse {
            is_correct,
            correct_answer_index: question.correct_answer_index,
            points_earned,
        })
    }
}
