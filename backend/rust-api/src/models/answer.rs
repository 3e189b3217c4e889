use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::Difficulty;
use super::user::bson_datetime_as_chrono_option;

/// One answer slot per assigned question, created (empty) at session start.
/// `difficulty` is copied from the question so the final score can be
/// recomputed from stored records alone.
///
/// Invariant: once `user_answer` is set it never changes. The store enforces
/// this with a conditional write (`record_answer`), so a duplicate submission
/// fails instead of overwriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub session_id: String,
    pub question_id: String,
    /// 1-based position within the session.
    pub question_order: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub user_answer: Option<u8>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    /// Seconds the player took, reported by the client.
    #[serde(default)]
    pub time_to_answer: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub answered_at: Option<DateTime<Utc>>,
}

impl AnswerRecord {
    pub fn placeholder(
        session_id: &str,
        question_id: &str,
        question_order: u32,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            question_id: question_id.to_string(),
            question_order,
            difficulty,
            user_answer: None,
            is_correct: None,
            time_to_answer: None,
            answered_at: None,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.user_answer.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    #[validate(range(max = 3, message = "Answer index must be between 0 and 3"))]
    pub answer_index: u8,
    #[validate(range(max = 86_400, message = "Time to answer out of range"))]
    pub time_to_answer: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub is_correct: bool,
    pub correct_answer_index: u8,
    pub points_earned: u32,
}
