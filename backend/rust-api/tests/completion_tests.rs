use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use quizrush_api::errors::GameError;
use quizrush_api::models::{
    Achievement, AnswerRecord, Difficulty, GameMode, GameSession, Question, SessionStatus,
    SubmitAnswerRequest, User, UserAchievement,
};
use quizrush_api::services::answer_service::AnswerService;
use quizrush_api::services::completion_service::CompletionService;
use quizrush_api::services::locks::KeyedLocks;
use quizrush_api::services::rewards;
use quizrush_api::services::session_service::SessionService;
use quizrush_api::store::{GameStore, MemoryStore, RecordedAnswer};

mod common;

struct Harness {
    store: Arc<MemoryStore>,
    sessions: SessionService,
    answers: AnswerService,
    completion: CompletionService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn GameStore> = store.clone();
    let session_locks = Arc::new(KeyedLocks::new());
    let user_locks = Arc::new(KeyedLocks::new());
    Harness {
        store: store.clone(),
        sessions: SessionService::new(dyn_store.clone()),
        answers: AnswerService::new(dyn_store.clone(), session_locks.clone()),
        completion: CompletionService::new(dyn_store, session_locks, user_locks),
    }
}

fn answer(question_id: &str, answer_index: u8, time_to_answer: u32) -> SubmitAnswerRequest {
    SubmitAnswerRequest {
        question_id: question_id.to_string(),
        answer_index,
        time_to_answer,
    }
}

/// Story mode with a category keeps question order stable, so the exact
/// score of a scripted game is predictable.
async fn play_graded_game(h: &Harness, user_id: &str, category: &str) -> String {
    h.store.seed_questions(common::graded_category(category));

    let started = h
        .sessions
        .create_session(user_id, GameMode::Story, Some(category))
        .await
        .unwrap();

    // easy correct fast (+150), medium correct slow (+150), hard wrong (0)
    let script = [
        (format!("{}-q1", category), 1u8, 5u32),
        (format!("{}-q2", category), 1, 12),
        (format!("{}-q3", category), 0, 20),
    ];
    for (question_id, index, secs) in &script {
        h.answers
            .submit_answer(&started.session_id, user_id, &answer(question_id, *index, *secs))
            .await
            .unwrap();
    }

    started.session_id
}

#[tokio::test]
async fn completion_persists_recomputed_score() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));

    let session_id = play_graded_game(&h, "u1", "history").await;
    let result = h.completion.complete_game(&session_id, "u1").await.unwrap();

    assert_eq!(result.score, 300);
    assert_eq!(result.correct_answers, 2);
    assert_eq!(result.total_questions, 3);
    assert_eq!(result.accuracy, 67);
    assert_eq!(result.xp_earned, 45);
    assert_eq!(result.coins_earned, 13);
    assert!(!result.leveled_up);
    assert_eq!(result.new_level, 1);
    // First completed game, but 2/3 is not perfect.
    assert_eq!(result.new_achievements, vec![Achievement::FirstWin]);

    let session = h.store.session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.score, 300);
    assert_eq!(session.xp_earned, 45);
    assert!(session.completed_at.is_some());

    // The persisted score matches an independent recomputation from the
    // stored answer records.
    let records = h.store.answers(&session_id);
    let (score, correct) = rewards::score_answers(&records);
    assert_eq!(score, session.score);
    assert_eq!(correct, session.correct_answers);
}

#[tokio::test]
async fn second_completion_awards_nothing() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));

    let session_id = play_graded_game(&h, "u1", "science").await;
    h.completion.complete_game(&session_id, "u1").await.unwrap();

    let snapshot = h.store.user("u1").unwrap();

    let err = h
        .completion
        .complete_game(&session_id, "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::SessionAlreadyCompleted));

    let after = h.store.user("u1").unwrap();
    assert_eq!(after.xp, snapshot.xp);
    assert_eq!(after.coins, snapshot.coins);
    assert_eq!(after.total_games, snapshot.total_games);
}

#[tokio::test]
async fn recorded_answer_is_immutable() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));
    h.store.seed_questions(common::graded_category("art"));

    let started = h
        .sessions
        .create_session("u1", GameMode::Story, Some("art"))
        .await
        .unwrap();

    h.answers
        .submit_answer(&started.session_id, "u1", &answer("art-q1", 2, 4))
        .await
        .unwrap();

    let err = h
        .answers
        .submit_answer(&started.session_id, "u1", &answer("art-q1", 1, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::QuestionAlreadyAnswered));

    let records = h.store.answers(&started.session_id);
    let record = records
        .iter()
        .find(|r| r.question_id == "art-q1")
        .unwrap();
    assert_eq!(record.user_answer, Some(2));
    assert_eq!(record.is_correct, Some(false));
}

#[tokio::test]
async fn concurrent_submissions_record_exactly_one() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));
    h.store.seed_questions(common::graded_category("geo"));

    let started = h
        .sessions
        .create_session("u1", GameMode::Story, Some("geo"))
        .await
        .unwrap();

    let answers = Arc::new(h.answers);
    let mut handles = Vec::new();
    for attempt in 0..8u8 {
        let answers = answers.clone();
        let session_id = started.session_id.clone();
        handles.push(tokio::spawn(async move {
            answers
                .submit_answer(&session_id, "u1", &answer("geo-q1", attempt % 4, 3))
                .await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(GameError::QuestionAlreadyAnswered) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let records = h.store.answers(&started.session_id);
    let record = records
        .iter()
        .find(|r| r.question_id == "geo-q1")
        .unwrap();
    assert!(record.is_answered());
}

#[tokio::test]
async fn streak_extends_after_one_day_gap() {
    let h = harness();
    let mut user = common::fresh_user("u1");
    user.current_streak = 4;
    user.best_streak = 4;
    user.last_play_date = Some(Utc::now() - Duration::days(1));
    h.store.seed_user(user);

    let session_id = play_graded_game(&h, "u1", "music").await;
    let result = h.completion.complete_game(&session_id, "u1").await.unwrap();

    assert_eq!(result.current_streak, 5);
    let user = h.store.user("u1").unwrap();
    assert_eq!(user.current_streak, 5);
    assert_eq!(user.best_streak, 5);
}

#[tokio::test]
async fn streak_resets_after_long_gap() {
    let h = harness();
    let mut user = common::fresh_user("u1");
    user.current_streak = 9;
    user.best_streak = 9;
    user.last_play_date = Some(Utc::now() - Duration::days(3));
    h.store.seed_user(user);

    let session_id = play_graded_game(&h, "u1", "film").await;
    let result = h.completion.complete_game(&session_id, "u1").await.unwrap();

    assert_eq!(result.current_streak, 1);
    let user = h.store.user("u1").unwrap();
    assert_eq!(user.current_streak, 1);
    // The best streak is a high-water mark and survives the reset.
    assert_eq!(user.best_streak, 9);
}

#[tokio::test]
async fn same_day_completion_keeps_streak() {
    let h = harness();
    let mut user = common::fresh_user("u1");
    user.current_streak = 2;
    user.best_streak = 2;
    user.last_play_date = Some(Utc::now());
    h.store.seed_user(user);

    let session_id = play_graded_game(&h, "u1", "space").await;
    let result = h.completion.complete_game(&session_id, "u1").await.unwrap();

    assert_eq!(result.current_streak, 2);
}

#[tokio::test]
async fn crossing_a_level_threshold_pays_the_bonus() {
    let h = harness();
    let mut user = common::fresh_user("u1");
    user.xp = 950;
    user.level = 1;
    h.store.seed_user(user);

    h.store.seed_questions(vec![
        common::question("boss-q1", Difficulty::Hard, Some("boss")),
        common::question("boss-q2", Difficulty::Hard, Some("boss")),
        common::question("boss-q3", Difficulty::Hard, Some("boss")),
    ]);

    let started = h
        .sessions
        .create_session("u1", GameMode::Story, Some("boss"))
        .await
        .unwrap();
    for question_id in ["boss-q1", "boss-q2", "boss-q3"] {
        h.answers
            .submit_answer(&started.session_id, "u1", &answer(question_id, 1, 4))
            .await
            .unwrap();
    }

    let result = h
        .completion
        .complete_game(&started.session_id, "u1")
        .await
        .unwrap();

    // 3 hard, all fast: score 750, xp floor(10 * 1.8 * 6.0) = 108.
    assert_eq!(result.score, 750);
    assert_eq!(result.xp_earned, 108);
    assert!(result.leveled_up);
    assert_eq!(result.new_level, 2);
    // floor(750/100) + 3*5 = 22, plus the level 2 bonus of 20.
    assert_eq!(result.coins_earned, 42);
    assert_eq!(
        result.new_achievements,
        vec![Achievement::FirstWin, Achievement::Perfectionist]
    );

    let user = h.store.user("u1").unwrap();
    assert_eq!(user.xp, 1058);
    assert_eq!(user.level, 2);
    assert_eq!(user.coins, 42);
}

#[tokio::test]
async fn abandoned_session_earns_nothing() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));

    let session_id = play_graded_game(&h, "u1", "history").await;
    h.store.set_session_status(&session_id, SessionStatus::Abandoned);

    let err = h
        .completion
        .complete_game(&session_id, "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::SessionAlreadyCompleted));

    let user = h.store.user("u1").unwrap();
    assert_eq!(user.xp, 0);
    assert_eq!(user.total_games, 0);
}

#[tokio::test]
async fn completion_by_wrong_owner_is_not_found() {
    let h = harness();
    h.store.seed_user(common::fresh_user("owner"));
    h.store.seed_user(common::fresh_user("intruder"));

    let session_id = play_graded_game(&h, "owner", "science").await;

    let err = h
        .completion
        .complete_game(&session_id, "intruder")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::SessionNotFound));

    let session = h.store.session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);
}

#[tokio::test]
async fn unanswered_slots_count_against_accuracy() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));
    h.store.seed_questions(common::graded_category("partial"));

    let started = h
        .sessions
        .create_session("u1", GameMode::Story, Some("partial"))
        .await
        .unwrap();
    // Only the first question is answered; the session is completed early.
    h.answers
        .submit_answer(&started.session_id, "u1", &answer("partial-q1", 1, 5))
        .await
        .unwrap();

    let result = h
        .completion
        .complete_game(&started.session_id, "u1")
        .await
        .unwrap();

    assert_eq!(result.score, 150);
    assert_eq!(result.correct_answers, 1);
    assert_eq!(result.total_questions, 3);
    assert_eq!(result.accuracy, 33);
}

#[tokio::test]
async fn history_reflects_completed_games_newest_first() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));

    let first = play_graded_game(&h, "u1", "alpha").await;
    h.completion.complete_game(&first, "u1").await.unwrap();
    let second = play_graded_game(&h, "u1", "beta").await;
    h.completion.complete_game(&second, "u1").await.unwrap();

    let page = h.completion.get_history("u1", None, None).await.unwrap();
    assert_eq!(page.pagination.total_games, 2);
    assert_eq!(page.games.len(), 2);
    assert_eq!(page.games[0].id, second);
    assert_eq!(page.games[1].id, first);

    let small = h.completion.get_history("u1", Some(2), Some(1)).await.unwrap();
    assert_eq!(small.games.len(), 1);
    assert_eq!(small.games[0].id, first);
    assert!(small.pagination.has_prev);
    assert!(!small.pagination.has_next);
}

async fn play_perfect_game(h: &Harness, user_id: &str, category: &str) -> String {
    h.store.seed_questions(common::graded_category(category));
    let started = h
        .sessions
        .create_session(user_id, GameMode::Story, Some(category))
        .await
        .unwrap();
    for suffix in ["q1", "q2", "q3"] {
        h.answers
            .submit_answer(
                &started.session_id,
                user_id,
                &answer(&format!("{}-{}", category, suffix), 1, 4),
            )
            .await
            .unwrap();
    }
    started.session_id
}

#[tokio::test]
async fn achievements_unlock_only_once() {
    let h = harness();
    h.store.seed_user(common::fresh_user("u1"));

    let first = play_perfect_game(&h, "u1", "alpha").await;
    let result = h.completion.complete_game(&first, "u1").await.unwrap();
    assert_eq!(
        result.new_achievements,
        vec![Achievement::FirstWin, Achievement::Perfectionist]
    );

    // A second perfect game qualifies for perfectionist again, but the
    // unlock already exists, so nothing is reported as new.
    let second = play_perfect_game(&h, "u1", "beta").await;
    let result = h.completion.complete_game(&second, "u1").await.unwrap();
    assert!(result.new_achievements.is_empty());

    let mut unlocked = h.store.unlocked_achievements("u1");
    unlocked.sort_by_key(|a| a.as_str().to_string());
    assert_eq!(
        unlocked,
        vec![Achievement::FirstWin, Achievement::Perfectionist]
    );
}

#[tokio::test]
async fn tenth_consecutive_day_unlocks_streak_master() {
    let h = harness();
    let mut user = common::fresh_user("u1");
    user.current_streak = 9;
    user.best_streak = 9;
    user.total_games = 9;
    user.last_play_date = Some(Utc::now() - Duration::days(1));
    h.store.seed_user(user);

    let session_id = play_graded_game(&h, "u1", "history").await;
    let result = h.completion.complete_game(&session_id, "u1").await.unwrap();

    assert_eq!(result.current_streak, 10);
    assert_eq!(result.new_achievements, vec![Achievement::StreakMaster]);
}

/// Delegates to a `MemoryStore` but fails `apply_completion` while armed,
/// standing in for a database outage mid-completion.
struct OutageStore {
    inner: Arc<MemoryStore>,
    fail_completions: AtomicBool,
}

impl OutageStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_completions: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_completions.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl GameStore for OutageStore {
    async fn ping(&self) -> Result<(), GameError> {
        self.inner.ping().await
    }

    async fn list_questions(&self, category_id: Option<&str>) -> Result<Vec<Question>, GameError> {
        self.inner.list_questions(category_id).await
    }

    async fn fetch_questions(&self, ids: &[String]) -> Result<Vec<Question>, GameError> {
        self.inner.fetch_questions(ids).await
    }

    async fn insert_session(
        &self,
        session: &GameSession,
        answers: &[AnswerRecord],
    ) -> Result<(), GameError> {
        self.inner.insert_session(session, answers).await
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<GameSession>, GameError> {
        self.inner.fetch_session(session_id).await
    }

    async fn fetch_answers(&self, session_id: &str) -> Result<Vec<AnswerRecord>, GameError> {
        self.inner.fetch_answers(session_id).await
    }

    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &RecordedAnswer,
    ) -> Result<bool, GameError> {
        self.inner.record_answer(session_id, question_id, answer).await
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, GameError> {
        self.inner.fetch_user(user_id).await
    }

    async fn apply_completion(
        &self,
        session: &GameSession,
        user: &User,
        unlocks: &[UserAchievement],
    ) -> Result<Vec<Achievement>, GameError> {
        if self.fail_completions.load(Ordering::SeqCst) {
            return Err(GameError::Dependency(anyhow::anyhow!(
                "connection reset during commit"
            )));
        }
        self.inner.apply_completion(session, user, unlocks).await
    }

    async fn count_active_sessions(&self) -> Result<u64, GameError> {
        self.inner.count_active_sessions().await
    }

    async fn completed_sessions(
        &self,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<GameSession>, u64), GameError> {
        self.inner.completed_sessions(user_id, offset, limit).await
    }
}

#[tokio::test]
async fn failed_completion_leaves_session_retryable() {
    let memory = Arc::new(MemoryStore::new());
    let outage = Arc::new(OutageStore::new(memory.clone()));
    let dyn_store: Arc<dyn GameStore> = outage.clone();
    let session_locks = Arc::new(KeyedLocks::new());
    let user_locks = Arc::new(KeyedLocks::new());

    let sessions = SessionService::new(dyn_store.clone());
    let answers = AnswerService::new(dyn_store.clone(), session_locks.clone());
    let completion = CompletionService::new(dyn_store, session_locks, user_locks);

    memory.seed_user(common::fresh_user("u1"));
    memory.seed_questions(common::graded_category("history"));

    let started = sessions
        .create_session("u1", GameMode::Story, Some("history"))
        .await
        .unwrap();
    answers
        .submit_answer(&started.session_id, "u1", &answer("history-q1", 1, 5))
        .await
        .unwrap();

    outage.set_failing(true);
    let err = completion
        .complete_game(&started.session_id, "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Dependency(_)));

    // Nothing landed: the session is still in progress and the user
    // earned nothing.
    let session = memory.session(&started.session_id).unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.score, 0);
    let user = memory.user("u1").unwrap();
    assert_eq!(user.xp, 0);
    assert_eq!(user.total_games, 0);
    assert!(memory.unlocked_achievements("u1").is_empty());

    // After the outage the same call succeeds with the full rewards.
    outage.set_failing(false);
    let result = completion
        .complete_game(&started.session_id, "u1")
        .await
        .unwrap();
    assert_eq!(result.score, 150);
    assert_eq!(result.new_achievements, vec![Achievement::FirstWin]);
    assert_eq!(memory.user("u1").unwrap().total_games, 1);
}
