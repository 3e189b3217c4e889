use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

pub mod achievement;
pub mod answer;
pub mod question;
pub mod user;

/// One played game, stored in the "game_sessions" collection.
/// Score/reward fields stay at zero until the session is completed; after
/// that the record is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub game_mode: GameMode,
    pub category_id: Option<String>,
    pub status: SessionStatus,
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub xp_earned: u64,
    pub coins_earned: u64,
    #[serde(rename = "startedAt", with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    /// Completed and abandoned are terminal; there is no transition out.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameMode {
    SixtySecond,
    Classic,
    Story,
    Multiplayer,
}

impl GameMode {
    /// 60-second mode pulls a large pool for high-throughput play; the
    /// other modes play a fixed set of 10.
    pub fn question_count(&self) -> usize {
        match self {
            GameMode::SixtySecond => 50,
            _ => 10,
        }
    }

    pub fn xp_multiplier(&self) -> f64 {
        match self {
            GameMode::SixtySecond => 1.5,
            GameMode::Classic => 2.0,
            GameMode::Story => 1.8,
            GameMode::Multiplayer => 2.5,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GameMode::SixtySecond => "sixty-second",
            GameMode::Classic => "classic",
            GameMode::Story => "story",
            GameMode::Multiplayer => "multiplayer",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    pub game_mode: GameMode,
    pub category_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartGameResponse {
    pub session_id: String,
    pub game_mode: GameMode,
    pub category_id: Option<String>,
    pub total_questions: u32,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

/// Final result of a completed session, returned exactly once.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionResult {
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    /// Rounded percentage, 0–100.
    pub accuracy: u32,
    pub xp_earned: u64,
    pub coins_earned: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    /// Achievements unlocked for the first time by this completion.
    pub new_achievements: Vec<Achievement>,
    pub current_streak: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct GameSummary {
    pub id: String,
    pub game_mode: GameMode,
    pub category_id: Option<String>,
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub accuracy: u32,
    pub xp_earned: u64,
    pub coins_earned: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub games: Vec<GameSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_games: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Rounded-percent accuracy; 0 when nothing was asked.
pub fn accuracy_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

impl GameSession {
    pub fn summary(&self) -> GameSummary {
        GameSummary {
            id: self.id.clone(),
            game_mode: self.game_mode,
            category_id: self.category_id.clone(),
            score: self.score,
            correct_answers: self.correct_answers,
            total_questions: self.total_questions,
            accuracy: accuracy_percent(self.correct_answers, self.total_questions),
            xp_earned: self.xp_earned,
            coins_earned: self.coins_earned,
            completed_at: self.completed_at,
        }
    }
}

pub use achievement::{Achievement, UserAchievement};
pub use answer::{AnswerRecord, SubmitAnswerRequest, SubmitAnswerResponse};
pub use question::{Difficulty, Question, QuestionView};
pub use user::User;
