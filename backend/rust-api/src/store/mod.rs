use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::GameError;
use crate::models::{Achievement, AnswerRecord, GameSession, Question, User, UserAchievement};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Evaluated answer as written into an AnswerRecord slot.
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    pub answer_index: u8,
    pub is_correct: bool,
    pub time_to_answer: u32,
    pub answered_at: DateTime<Utc>,
}

/// Storage capability consumed by the game engine. Injected through
/// `AppState` so the engine never touches a concrete database handle;
/// `MongoStore` backs production and `MemoryStore` backs the tests.
///
/// Contracts the engine relies on:
/// - `insert_session` persists the session header and all answer
///   placeholders as one unit.
/// - `record_answer` writes only when the slot is still unset and reports
///   whether it won, so concurrent duplicates resolve to one winner.
/// - `apply_completion` finalizes the session, updates the user row and
///   records achievement unlocks atomically, and only while the stored
///   session is still in progress.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Cheap liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), GameError>;

    /// Active questions, optionally restricted to one category. Ordering is
    /// left to the caller.
    async fn list_questions(&self, category_id: Option<&str>) -> Result<Vec<Question>, GameError>;

    /// Questions by id, in no particular order; unknown ids are skipped.
    async fn fetch_questions(&self, ids: &[String]) -> Result<Vec<Question>, GameError>;

    async fn insert_session(
        &self,
        session: &GameSession,
        answers: &[AnswerRecord],
    ) -> Result<(), GameError>;

    async fn fetch_session(&self, session_id: &str) -> Result<Option<GameSession>, GameError>;

    /// All answer slots for a session, ordered by `question_order`.
    async fn fetch_answers(&self, session_id: &str) -> Result<Vec<AnswerRecord>, GameError>;

    /// Conditional write: fills the slot only if `user_answer` is unset.
    /// Returns false when the slot was already taken.
    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &RecordedAnswer,
    ) -> Result<bool, GameError>;

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, GameError>;

    /// Atomically persists the finalized session, the updated user row and
    /// any achievement unlocks. Fails with `SessionAlreadyCompleted` if the
    /// stored session has left `in_progress` in the meantime; on any failure
    /// none of the writes become visible. Unlocks are keyed on
    /// (user_id, achievement_key); the returned list holds only the keys
    /// that were actually new.
    async fn apply_completion(
        &self,
        session: &GameSession,
        user: &User,
        unlocks: &[UserAchievement],
    ) -> Result<Vec<Achievement>, GameError>;

    /// Number of sessions currently in progress, for the metrics gauge.
    async fn count_active_sessions(&self) -> Result<u64, GameError>;

    /// Completed sessions for a user, newest first, plus the total count.
    async fn completed_sessions(
        &self,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<GameSession>, u64), GameError>;
}
