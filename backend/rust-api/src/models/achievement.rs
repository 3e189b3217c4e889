use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;

/// Achievement keys awarded at game completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstWin,
    SpeedDemon,
    Perfectionist,
    StreakMaster,
}

impl Achievement {
    pub fn as_str(&self) -> &str {
        match self {
            Achievement::FirstWin => "first_win",
            Achievement::SpeedDemon => "speed_demon",
            Achievement::Perfectionist => "perfectionist",
            Achievement::StreakMaster => "streak_master",
        }
    }
}

/// Unlock record stored in the "user_achievements" collection, keyed on
/// (user_id, achievement_key) so an achievement unlocks at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_key: Achievement,
    #[serde(rename = "unlockedAt", with = "bson_datetime_as_chrono")]
    pub unlocked_at: DateTime<Utc>,
}

impl UserAchievement {
    pub fn new(user_id: &str, key: Achievement, unlocked_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            achievement_key: key,
            unlocked_at,
        }
    }
}
