use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Domain error taxonomy. Not-found and conflict variants are expected,
/// client-recoverable conditions; `Dependency` means the backing store
/// failed and the caller should retry with backoff (no retry loop lives
/// in this service).
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Question is not part of this session")]
    QuestionNotInSession,

    #[error("Question already answered")]
    QuestionAlreadyAnswered,

    #[error("Session already completed")]
    SessionAlreadyCompleted,

    #[error("User not found")]
    UserNotFound,

    #[error("No questions available for this game mode")]
    NoQuestionsAvailable,

    #[error("{0}")]
    Validation(String),

    #[error("Storage dependency failed: {0}")]
    Dependency(#[from] anyhow::Error),
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound => "SESSION_NOT_FOUND",
            GameError::QuestionNotInSession => "QUESTION_NOT_IN_SESSION",
            GameError::QuestionAlreadyAnswered => "QUESTION_ALREADY_ANSWERED",
            GameError::SessionAlreadyCompleted => "SESSION_ALREADY_COMPLETED",
            GameError::UserNotFound => "USER_NOT_FOUND",
            GameError::NoQuestionsAvailable => "NO_QUESTIONS_AVAILABLE",
            GameError::Validation(_) => "VALIDATION_ERROR",
            GameError::Dependency(_) => "DEPENDENCY_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GameError::SessionNotFound
            | GameError::QuestionNotInSession
            | GameError::UserNotFound
            | GameError::NoQuestionsAvailable => StatusCode::NOT_FOUND,
            GameError::QuestionAlreadyAnswered | GameError::SessionAlreadyCompleted => {
                StatusCode::CONFLICT
            }
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        if let GameError::Dependency(ref e) = self {
            tracing::error!("Storage dependency failure: {:#}", e);
        }
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status(), Json(body)).into_response()
    }
}
