use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::GameError,
    middlewares::auth::JwtClaims,
    models::{HistoryQuery, StartGameRequest, SubmitAnswerRequest},
    services::{
        answer_service::AnswerService, completion_service::CompletionService,
        session_service::SessionService, AppState,
    },
};

pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Json(req): Json<StartGameRequest>,
) -> Result<impl IntoResponse, GameError> {
    tracing::info!(
        user_id = %claims.sub,
        mode = req.game_mode.as_str(),
        category = ?req.category_id,
        "Starting game"
    );

    let service = SessionService::new(state.store.clone());
    let response = service
        .create_session(&claims.sub, req.game_mode, req.category_id.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_session_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let service = SessionService::new(state.store.clone());
    let questions = service
        .get_session_questions(&session_id, &claims.sub)
        .await?;

    Ok(Json(serde_json::json!({ "questions": questions })))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, GameError> {
    req.validate()
        .map_err(|e| GameError::Validation(e.to_string()))?;

    let service = AnswerService::new(state.store.clone(), state.session_locks.clone());
    let response = service.submit_answer(&session_id, &claims.sub, &req).await?;

    Ok(Json(response))
}

pub async fn complete_game(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, GameError> {
    let service = CompletionService::new(
        state.store.clone(),
        state.session_locks.clone(),
        state.user_locks.clone(),
    );
    let result = service.complete_game(&session_id, &claims.sub).await?;

    Ok(Json(result))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, GameError> {
    query
        .validate()
        .map_err(|e| GameError::Validation(e.to_string()))?;

    let service = CompletionService::new(
        state.store.clone(),
        state.session_locks.clone(),
        state.user_locks.clone(),
    );
    let page = service
        .get_history(&claims.sub, query.page, query.limit)
        .await?;

    Ok(Json(page))
}
