use std::sync::Arc;

use chrono::Utc;

use crate::errors::GameError;
use crate::metrics::{ACHIEVEMENTS_UNLOCKED_TOTAL, GAMES_TOTAL, LEVEL_UPS_TOTAL};
use crate::models::{
    accuracy_percent, CompletionResult, HistoryPage, Pagination, SessionStatus, UserAchievement,
};
use crate::store::GameStore;
use crate::utils::time::calendar_days_between;

use super::locks::KeyedLocks;
use super::rewards;
use super::session_service::SessionService;

const DEFAULT_HISTORY_LIMIT: u64 = 10;

/// Completion Orchestrator: turns the stored answer slots of one session
/// into a final score, rewards, level transition and streak update, and
/// persists all of it exactly once.
pub struct CompletionService {
    store: Arc<dyn GameStore>,
    session_locks: Arc<KeyedLocks>,
    user_locks: Arc<KeyedLocks>,
}

impl CompletionService {
    pub fn new(
        store: Arc<dyn GameStore>,
        session_locks: Arc<KeyedLocks>,
        user_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            session_locks,
            user_locks,
        }
    }

    pub async fn complete_game(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<CompletionResult, GameError> {
        // Session lock first, then the user lock. Submissions only ever take
        // the session lock, so the ordering cannot deadlock.
        let _session_guard = self.session_locks.acquire(session_id).await;

        let session = SessionService::new(self.store.clone())
            .get_session(session_id, user_id)
            .await?;
        if session.status.is_terminal() {
            // Also covers externally abandoned sessions: they earn nothing.
            return Err(GameError::SessionAlreadyCompleted);
        }

        // Score and correctness are recomputed from stored records; client
        // supplied aggregates are never trusted.
        let answers = self.store.fetch_answers(session_id).await?;
        let (score, correct_answers) = rewards::score_answers(&answers);
        let total_questions = answers.len() as u32;

        let xp_earned = rewards::compute_xp(session.game_mode, &answers);
        let mut coins_earned = rewards::compute_coins(score, correct_answers);

        let _user_guard = self.user_locks.acquire(user_id).await;

        let mut user = self
            .store
            .fetch_user(user_id)
            .await?
            .ok_or(GameError::UserNotFound)?;

        let new_xp = user.xp + xp_earned;
        let new_level = rewards::level_from_xp(new_xp);
        let leveled_up = new_level > user.level;
        if leveled_up {
            coins_earned += rewards::level_up_bonus(new_level);
        }

        let now = Utc::now();
        let current_streak = match user.last_play_date {
            Some(last_play) => match calendar_days_between(last_play, now) {
                0 => user.current_streak.max(1),
                1 => user.current_streak + 1,
                _ => 1,
            },
            None => 1,
        };

        user.xp = new_xp;
        user.level = new_level;
        user.coins += coins_earned;
        user.current_streak = current_streak;
        user.best_streak = user.best_streak.max(current_streak);
        user.total_games += 1;
        user.total_correct_answers += correct_answers as u64;
        user.last_play_date = Some(now);

        // Candidate achievements come from the updated aggregates; the
        // store keeps only the ones not unlocked before.
        let unlocks: Vec<UserAchievement> =
            rewards::check_achievements(&user, session.game_mode, correct_answers, total_questions)
                .into_iter()
                .map(|key| UserAchievement::new(user_id, key, now))
                .collect();

        let mut finalized = session;
        finalized.status = SessionStatus::Completed;
        finalized.score = score;
        finalized.correct_answers = correct_answers;
        finalized.total_questions = total_questions;
        finalized.xp_earned = xp_earned;
        finalized.coins_earned = coins_earned;
        finalized.completed_at = Some(now);

        // One atomic unit: session finalization, the user row and any
        // achievement unlocks together, or none of them. On failure the
        // session stays in progress and the caller may retry.
        let new_achievements = self
            .store
            .apply_completion(&finalized, &user, &unlocks)
            .await?;

        GAMES_TOTAL
            .with_label_values(&[finalized.game_mode.as_str(), "completed"])
            .inc();
        if leveled_up {
            LEVEL_UPS_TOTAL
                .with_label_values(&[finalized.game_mode.as_str()])
                .inc();
        }
        for achievement in &new_achievements {
            ACHIEVEMENTS_UNLOCKED_TOTAL
                .with_label_values(&[achievement.as_str()])
                .inc();
        }

        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            score,
            correct = correct_answers,
            xp = xp_earned,
            coins = coins_earned,
            leveled_up,
            streak = current_streak,
            achievements = new_achievements.len(),
            "Game session completed"
        );

        Ok(CompletionResult {
            score,
            correct_answers,
            total_questions,
            accuracy: accuracy_percent(correct_answers, total_questions),
            xp_earned,
            coins_earned,
            new_level,
            leveled_up,
            new_achievements,
            current_streak,
        })
    }

    /// Completed-session summaries, newest first. An empty page is valid.
    pub async fn get_history(
        &self,
        user_id: &str,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<HistoryPage, GameError> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
        let offset = (page - 1) * limit;

        let (games, total_games) = self.store.completed_sessions(user_id, offset, limit).await?;

        let total_pages = total_games.div_ceil(limit);
        Ok(HistoryPage {
            games: games.iter().map(|g| g.summary()).collect(),
            pagination: Pagination {
                current_page: page,
                total_pages,
                total_games,
                has_next: page < total_pages,
                has_prev: page > 1,
            },
        })
    }
}
