use serde::{Deserialize, Serialize};

/// Trivia question stored in the "questions" collection. Read-only to the
/// game engine; `correct_answer_index` is never serialized into client-facing
/// payloads (see `QuestionView`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: u8,
    pub difficulty: Difficulty,
    pub category_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Question as exposed to the playing client: no correct answer.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub question_id: String,
    pub question_order: u32,
    pub text: String,
    pub options: Vec<String>,
    pub difficulty: Difficulty,
    pub is_answered: bool,
}
