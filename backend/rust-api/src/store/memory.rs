use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::GameError;
use crate::models::{
    Achievement, AnswerRecord, GameSession, Question, SessionStatus, User, UserAchievement,
};

use super::{GameStore, RecordedAnswer};

/// In-memory `GameStore` used by the integration tests. Honors the same
/// contracts as `MongoStore`: conditional answer writes and all-or-nothing
/// completion (everything behind one mutex).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    questions: Vec<Question>,
    sessions: HashMap<String, GameSession>,
    answers: HashMap<String, Vec<AnswerRecord>>,
    users: HashMap<String, User>,
    achievements: HashSet<(String, Achievement)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_questions(&self, questions: Vec<Question>) {
        self.inner.lock().unwrap().questions.extend(questions);
    }

    pub fn seed_user(&self, user: User) {
        self.inner.lock().unwrap().users.insert(user.id.clone(), user);
    }

    /// Test hook: current state of a user row.
    pub fn user(&self, user_id: &str) -> Option<User> {
        self.inner.lock().unwrap().users.get(user_id).cloned()
    }

    /// Test hook: current state of a session.
    pub fn session(&self, session_id: &str) -> Option<GameSession> {
        self.inner.lock().unwrap().sessions.get(session_id).cloned()
    }

    /// Test hook: force a session status (e.g. externally abandoned).
    pub fn set_session_status(&self, session_id: &str, status: SessionStatus) {
        if let Some(session) = self.inner.lock().unwrap().sessions.get_mut(session_id) {
            session.status = status;
        }
    }

    /// Test hook: achievements unlocked for a user so far.
    pub fn unlocked_achievements(&self, user_id: &str) -> Vec<Achievement> {
        let inner = self.inner.lock().unwrap();
        inner
            .achievements
            .iter()
            .filter(|(uid, _)| uid == user_id)
            .map(|(_, key)| *key)
            .collect()
    }

    /// Test hook: answer slots of a session, in question order.
    pub fn answers(&self, session_id: &str) -> Vec<AnswerRecord> {
        self.inner
            .lock()
            .unwrap()
            .answers
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn ping(&self) -> Result<(), GameError> {
        Ok(())
    }

    async fn list_questions(&self, category_id: Option<&str>) -> Result<Vec<Question>, GameError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .questions
            .iter()
            .filter(|q| q.is_active)
            .filter(|q| match category_id {
                Some(cat) => q.category_id.as_deref() == Some(cat),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn fetch_questions(&self, ids: &[String]) -> Result<Vec<Question>, GameError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .questions
            .iter()
            .filter(|q| ids.iter().any(|id| id == &q.id))
            .cloned()
            .collect())
    }

    async fn insert_session(
        &self,
        session: &GameSession,
        answers: &[AnswerRecord],
    ) -> Result<(), GameError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .insert(session.id.clone(), session.clone());
        inner
            .answers
            .insert(session.id.clone(), answers.to_vec());
        Ok(())
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<GameSession>, GameError> {
        Ok(self.inner.lock().unwrap().sessions.get(session_id).cloned())
    }

    async fn fetch_answers(&self, session_id: &str) -> Result<Vec<AnswerRecord>, GameError> {
        let mut answers = self
            .inner
            .lock()
            .unwrap()
            .answers
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        answers.sort_by_key(|a| a.question_order);
        Ok(answers)
    }

    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &RecordedAnswer,
    ) -> Result<bool, GameError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(slots) = inner.answers.get_mut(session_id) else {
            return Ok(false);
        };
        let Some(slot) = slots.iter_mut().find(|a| a.question_id == question_id) else {
            return Ok(false);
        };
        if slot.user_answer.is_some() {
            return Ok(false);
        }
        slot.user_answer = Some(answer.answer_index);
        slot.is_correct = Some(answer.is_correct);
        slot.time_to_answer = Some(answer.time_to_answer);
        slot.answered_at = Some(answer.answered_at);
        Ok(true)
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, GameError> {
        Ok(self.inner.lock().unwrap().users.get(user_id).cloned())
    }

    async fn apply_completion(
        &self,
        session: &GameSession,
        user: &User,
        unlocks: &[UserAchievement],
    ) -> Result<Vec<Achievement>, GameError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.get(&session.id) {
            Some(stored) if stored.status == SessionStatus::InProgress => {}
            Some(_) => return Err(GameError::SessionAlreadyCompleted),
            None => return Err(GameError::SessionNotFound),
        }
        inner
            .sessions
            .insert(session.id.clone(), session.clone());
        inner.users.insert(user.id.clone(), user.clone());

        let mut newly_unlocked = Vec::new();
        for unlock in unlocks {
            let key = (unlock.user_id.clone(), unlock.achievement_key);
            if inner.achievements.insert(key) {
                newly_unlocked.push(unlock.achievement_key);
            }
        }
        Ok(newly_unlocked)
    }

    async fn count_active_sessions(&self) -> Result<u64, GameError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::InProgress)
            .count() as u64)
    }

    async fn completed_sessions(
        &self,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<GameSession>, u64), GameError> {
        let inner = self.inner.lock().unwrap();
        let mut games: Vec<GameSession> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.status == SessionStatus::Completed)
            .cloned()
            .collect();
        games.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        let total = games.len() as u64;
        let page: Vec<GameSession> = games
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok((page, total))
    }
}
