//! Disambiguation session API handlers
//!
//! POST /sessions, GET /sessions/:id, POST /sessions/:id/choices,
//! POST /sessions/:id/save-verified, POST /sessions/:id/confirm,
//! POST /sessions/:id/commit, POST /sessions/:id/abandon,
//! GET /sessions/:id/cleanup, DELETE /sessions/:id

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    models::{ChoiceOutcome, EntityKey, EntityKind, ExtractedEntity, SessionId, SessionView, UserChoice},
    services::{CleanupReason, CommitReport, SaveReport},
    AppState,
};

/// POST /sessions request: the AI service's analysis batch
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub entities: Vec<ExtractedEntity>,
}

/// POST /sessions/:id/choices request
#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    pub bottle_index: usize,
    pub kind: EntityKind,
    pub choice: UserChoice,
}

/// POST /sessions/:id/choices response
#[derive(Debug, Serialize)]
pub struct ChoiceResponse {
    pub outcome: ChoiceOutcome,
    pub session: SessionView,
}

/// Query for cleanup endpoints
#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub reason: Option<String>,
}

impl CleanupQuery {
    fn reason(&self) -> ApiResult<CleanupReason> {
        match self.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => Ok(CleanupReason::from(reason)),
            _ => Err(ApiError::BadRequest(
                "query parameter 'reason' is required".to_string(),
            )),
        }
    }
}

/// GET /sessions/:id/cleanup response
#[derive(Debug, Serialize)]
pub struct CleanupCheckResponse {
    pub session_id: SessionId,
    pub reason: CleanupReason,
    pub allowed: bool,
}

/// Response for abandon and cleanup
#[derive(Debug, Serialize)]
pub struct ReleasedResponse {
    pub session_id: SessionId,
    pub reason: String,
}

/// POST /sessions
///
/// Score the batch and open a session. Returns 201 with the initial view.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let view = state
        .workflow
        .start_session(request.entities, &*state.catalog)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /sessions/:id
///
/// Current decisions, candidates and progress; used to resume after reload.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let view = state.workflow.session_view(&SessionId::from(session_id)).await?;
    Ok(Json(view))
}

/// POST /sessions/:id/choices
pub async fn record_choice(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChoiceRequest>,
) -> ApiResult<Json<ChoiceResponse>> {
    let key = EntityKey::new(request.bottle_index, request.kind);
    let (outcome, session) = state
        .workflow
        .record_user_choice(&SessionId::from(session_id), key, request.choice)
        .await?;
    Ok(Json(ChoiceResponse { outcome, session }))
}

/// POST /sessions/:id/save-verified
pub async fn save_verified(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SaveReport>> {
    let report = state
        .workflow
        .save_verified_only(&SessionId::from(session_id))
        .await?;
    Ok(Json(report))
}

/// POST /sessions/:id/confirm
///
/// 409 while any entity is pending.
pub async fn confirm_all(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let view = state.workflow.confirm_all(&SessionId::from(session_id)).await?;
    Ok(Json(view))
}

/// POST /sessions/:id/commit
///
/// 503 when persistence fails; the session stays active and can be retried.
pub async fn commit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CommitReport>> {
    let report = state.workflow.commit(&SessionId::from(session_id)).await?;
    Ok(Json(report))
}

/// POST /sessions/:id/abandon
pub async fn abandon(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<ReleasedResponse>> {
    let session_id = SessionId::from(session_id);
    state.workflow.abandon(&session_id).await?;
    Ok(Json(ReleasedResponse {
        session_id,
        reason: "user".to_string(),
    }))
}

/// GET /sessions/:id/cleanup?reason=...
pub async fn check_cleanup(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<Json<CleanupCheckResponse>> {
    let reason = query.reason()?;
    let session_id = SessionId::from(session_id);
    let allowed = state.workflow.can_cleanup(&session_id, &reason).await?;
    Ok(Json(CleanupCheckResponse {
        session_id,
        reason,
        allowed,
    }))
}

/// DELETE /sessions/:id?reason=...
///
/// 409 when the guard protects pending human work.
pub async fn cleanup(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<Json<ReleasedResponse>> {
    let reason = query.reason()?;
    let session_id = SessionId::from(session_id);
    state.workflow.cleanup(&session_id, reason.clone()).await?;
    Ok(Json(ReleasedResponse {
        session_id,
        reason: reason.to_string(),
    }))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session).delete(cleanup))
        .route("/sessions/:id/choices", post(record_choice))
        .route("/sessions/:id/save-verified", post(save_verified))
        .route("/sessions/:id/confirm", post(confirm_all))
        .route("/sessions/:id/commit", post(commit))
        .route("/sessions/:id/abandon", post(abandon))
        .route("/sessions/:id/cleanup", get(check_cleanup))
}
