use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson},
    Client, Collection, Database,
};

use crate::errors::GameError;
use crate::metrics::track_db_operation;
use crate::models::{
    Achievement, AnswerRecord, GameSession, Question, SessionStatus, User, UserAchievement,
};
use crate::utils::time::chrono_to_bson;

use super::{GameStore, RecordedAnswer};

const SESSIONS: &str = "game_sessions";
const ANSWERS: &str = "answer_records";
const QUESTIONS: &str = "questions";
const USERS: &str = "users";
const ACHIEVEMENTS: &str = "user_achievements";

/// Production store. Multi-document writes (session creation, completion)
/// run inside a MongoDB transaction so they land all-or-nothing.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self { client, db }
    }

    fn sessions(&self) -> Collection<GameSession> {
        self.db.collection(SESSIONS)
    }

    fn answers(&self) -> Collection<AnswerRecord> {
        self.db.collection(ANSWERS)
    }

    fn questions(&self) -> Collection<Question> {
        self.db.collection(QUESTIONS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn achievements(&self) -> Collection<UserAchievement> {
        self.db.collection(ACHIEVEMENTS)
    }
}

#[async_trait]
impl GameStore for MongoStore {
    async fn ping(&self) -> Result<(), GameError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }

    async fn list_questions(&self, category_id: Option<&str>) -> Result<Vec<Question>, GameError> {
        let mut filter = doc! { "is_active": true };
        if let Some(category) = category_id {
            filter.insert("category_id", category);
        }

        let questions = track_db_operation("find", QUESTIONS, async {
            let cursor = self
                .questions()
                .find(filter)
                .await
                .context("Failed to query questions")?;
            cursor
                .try_collect::<Vec<Question>>()
                .await
                .context("Question cursor failed")
        })
        .await?;

        Ok(questions)
    }

    async fn fetch_questions(&self, ids: &[String]) -> Result<Vec<Question>, GameError> {
        let questions = track_db_operation("find", QUESTIONS, async {
            let cursor = self
                .questions()
                .find(doc! { "_id": { "$in": ids } })
                .await
                .context("Failed to query questions by id")?;
            cursor
                .try_collect::<Vec<Question>>()
                .await
                .context("Question cursor failed")
        })
        .await?;

        Ok(questions)
    }

    async fn insert_session(
        &self,
        session: &GameSession,
        answers: &[AnswerRecord],
    ) -> Result<(), GameError> {
        let mut txn = self
            .client
            .start_session()
            .await
            .context("Failed to start MongoDB session")?;
        txn.start_transaction()
            .await
            .context("Failed to start transaction")?;

        let result: Result<(), mongodb::error::Error> = async {
            self.sessions()
                .insert_one(session)
                .session(&mut txn)
                .await?;
            self.answers()
                .insert_many(answers)
                .session(&mut txn)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                txn.commit_transaction()
                    .await
                    .context("Failed to commit session creation")?;
                Ok(())
            }
            Err(e) => {
                let _ = txn.abort_transaction().await;
                Err(GameError::Dependency(
                    anyhow::Error::new(e).context("Failed to persist new session"),
                ))
            }
        }
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<GameSession>, GameError> {
        let session = track_db_operation("find_one", SESSIONS, async {
            self.sessions()
                .find_one(doc! { "_id": session_id })
                .await
                .context("Failed to query session")
        })
        .await?;

        Ok(session)
    }

    async fn fetch_answers(&self, session_id: &str) -> Result<Vec<AnswerRecord>, GameError> {
        let answers = track_db_operation("find", ANSWERS, async {
            let cursor = self
                .answers()
                .find(doc! { "session_id": session_id })
                .sort(doc! { "question_order": 1 })
                .await
                .context("Failed to query answer records")?;
            cursor
                .try_collect::<Vec<AnswerRecord>>()
                .await
                .context("Answer cursor failed")
        })
        .await?;

        Ok(answers)
    }

    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &RecordedAnswer,
    ) -> Result<bool, GameError> {
        // Answer-once: the filter only matches while the slot is unset, so
        // concurrent duplicates resolve to exactly one matched write.
        let filter = doc! {
            "session_id": session_id,
            "question_id": question_id,
            "user_answer": Bson::Null,
        };
        let update = doc! {
            "$set": {
                "user_answer": answer.answer_index as i32,
                "is_correct": answer.is_correct,
                "time_to_answer": answer.time_to_answer as i32,
                "answered_at": chrono_to_bson(answer.answered_at),
            }
        };

        let result = track_db_operation("update_one", ANSWERS, async {
            self.answers()
                .update_one(filter, update)
                .await
                .context("Failed to record answer")
        })
        .await?;

        Ok(result.matched_count == 1)
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, GameError> {
        let user = track_db_operation("find_one", USERS, async {
            self.users()
                .find_one(doc! { "_id": user_id })
                .await
                .context("Failed to query user")
        })
        .await?;

        Ok(user)
    }

    async fn apply_completion(
        &self,
        session: &GameSession,
        user: &User,
        unlocks: &[UserAchievement],
    ) -> Result<Vec<Achievement>, GameError> {
        let mut txn = self
            .client
            .start_session()
            .await
            .context("Failed to start MongoDB session")?;
        txn.start_transaction()
            .await
            .context("Failed to start transaction")?;

        // The status guard doubles as an optimistic check: if another
        // completion slipped in, nothing matches and we abort.
        let guard = doc! {
            "_id": &session.id,
            "status": SessionStatus::InProgress.as_str(),
        };

        let result: Result<Option<Vec<Achievement>>, mongodb::error::Error> = async {
            let updated = self
                .sessions()
                .replace_one(guard, session)
                .session(&mut txn)
                .await?;
            if updated.matched_count != 1 {
                return Ok(None);
            }
            self.users()
                .replace_one(doc! { "_id": &user.id }, user)
                .session(&mut txn)
                .await?;

            // Upsert keyed on (user_id, achievement_key): only a first
            // unlock inserts, and only inserts are reported as new.
            let mut newly_unlocked = Vec::new();
            for unlock in unlocks {
                let filter = doc! {
                    "user_id": &unlock.user_id,
                    "achievement_key": unlock.achievement_key.as_str(),
                };
                let update = doc! {
                    "$setOnInsert": {
                        "user_id": &unlock.user_id,
                        "achievement_key": unlock.achievement_key.as_str(),
                        "unlockedAt": chrono_to_bson(unlock.unlocked_at),
                    }
                };
                let outcome = self
                    .achievements()
                    .update_one(filter, update)
                    .upsert(true)
                    .session(&mut txn)
                    .await?;
                if outcome.upserted_id.is_some() {
                    newly_unlocked.push(unlock.achievement_key);
                }
            }
            Ok(Some(newly_unlocked))
        }
        .await;

        match result {
            Ok(Some(newly_unlocked)) => {
                txn.commit_transaction()
                    .await
                    .context("Failed to commit completion")?;
                Ok(newly_unlocked)
            }
            Ok(None) => {
                let _ = txn.abort_transaction().await;
                Err(GameError::SessionAlreadyCompleted)
            }
            Err(e) => {
                let _ = txn.abort_transaction().await;
                Err(GameError::Dependency(
                    anyhow::Error::new(e).context("Failed to persist completion"),
                ))
            }
        }
    }

    async fn count_active_sessions(&self) -> Result<u64, GameError> {
        let count = track_db_operation("count", SESSIONS, async {
            self.sessions()
                .count_documents(doc! { "status": SessionStatus::InProgress.as_str() })
                .await
                .context("Failed to count active sessions")
        })
        .await?;

        Ok(count)
    }

    async fn completed_sessions(
        &self,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<GameSession>, u64), GameError> {
        let filter = doc! {
            "user_id": user_id,
            "status": SessionStatus::Completed.as_str(),
        };

        let total = track_db_operation("count", SESSIONS, async {
            self.sessions()
                .count_documents(filter.clone())
                .await
                .context("Failed to count completed sessions")
        })
        .await?;

        let games = track_db_operation("find", SESSIONS, async {
            let cursor = self
                .sessions()
                .find(filter)
                .sort(doc! { "completedAt": -1 })
                .skip(offset)
                .limit(limit as i64)
                .await
                .context("Failed to query game history")?;
            cursor
                .try_collect::<Vec<GameSession>>()
                .await
                .context("History cursor failed")
        })
        .await?;

        Ok((games, total))
    }
}
