//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    domain::{Role, Sequence, UserId},
    infrastructure::dto::http::{ErrorDto, HistoryPageDto, HistoryQuery, OnlineUsersDto},
    ui::state::AppState,
    usecase::ChatError,
};

type ApiError = (StatusCode, Json<ErrorDto>);

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Snapshot of online users, sorted
pub async fn online_users(State(state): State<Arc<AppState>>) -> Json<OnlineUsersDto> {
    let user_ids = state
        .presence
        .list_online()
        .into_iter()
        .map(UserId::into_string)
        .collect();
    Json(OnlineUsersDto { user_ids })
}

/// One page of a conversation's history, with its current access decision
///
/// Only the conversation's own patient or doctor may read it.
pub async fn conversation_messages(
    State(state): State<Arc<AppState>>,
    Path((patient_id, doctor_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPageDto>, ApiError> {
    let requester = parse_user(&query.user_id)?;
    let role = Role::try_from(query.role.as_str())
        .map_err(|e| api_error(&ChatError::InvalidRequest(e.to_string())))?;
    let patient = parse_user(&patient_id)?;
    let doctor = parse_user(&doctor_id)?;

    let (access, page) = state
        .sessions
        .conversation_history(
            &requester,
            role,
            patient,
            doctor,
            query.limit,
            query.before.map(Sequence::new),
        )
        .await
        .map_err(|e| api_error(&e))?;

    // Domain Model から DTO への変換
    Ok(Json(state.encoder.http_history_page(&access, &page)))
}

fn parse_user(raw: &str) -> Result<UserId, ApiError> {
    UserId::try_from(raw)
        .map_err(|e| api_error(&ChatError::InvalidRequest(e.to_string())))
}

fn status_for(error: &ChatError) -> StatusCode {
    match error {
        ChatError::NoAppointmentFound => StatusCode::NOT_FOUND,
        ChatError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        ChatError::PersistenceError(_) | ChatError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::NotJoined(_) | ChatError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    }
}

fn api_error(error: &ChatError) -> ApiError {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::warn!("History request failed: {}", error);
    }
    (
        status,
        Json(ErrorDto {
            code: error.code().to_string(),
            reason: error.reason(),
        }),
    )
}
