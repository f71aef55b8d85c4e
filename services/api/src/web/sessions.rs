//! services/api/src/web/sessions.rs
//!
//! CRUD endpoints for calendar study sessions.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::domain::{
    NewStudySession, SessionError, SessionStatus, SessionUpdate, StudySession,
};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::rest::{bad_request, invalid_body, port_error, ErrorBody, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: String,
    /// One of `scheduled`, `completed`, `missed`, `deleted`.
    pub status: String,
    pub progress: u8,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
}

impl From<StudySession> for SessionResponse {
    fn from(session: StudySession) -> Self {
        Self {
            id: session.id,
            subject: session.subject,
            start_time: session.start_time,
            end_time: session.end_time,
            description: session.description,
            status: session.status.as_str().to_string(),
            progress: session.progress,
            is_ai_generated: session.is_ai_generated,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub progress: Option<u32>,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: Option<bool>,
}

impl TryFrom<CreateSessionRequest> for NewStudySession {
    type Error = SessionError;

    fn try_from(req: CreateSessionRequest) -> Result<Self, Self::Error> {
        NewStudySession {
            subject: req.subject,
            start_time: req.start_time,
            end_time: req.end_time,
            description: req.description.unwrap_or_default(),
            status: req
                .status
                .as_deref()
                .map(str::parse::<SessionStatus>)
                .transpose()?
                .unwrap_or_default(),
            progress: req.progress.map(checked_progress).transpose()?.unwrap_or(0),
            is_ai_generated: req.is_ai_generated.unwrap_or(false),
        }
        .validated()
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub subject: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub progress: Option<u32>,
}

impl TryFrom<UpdateSessionRequest> for SessionUpdate {
    type Error = SessionError;

    fn try_from(req: UpdateSessionRequest) -> Result<Self, Self::Error> {
        Ok(SessionUpdate {
            subject: req.subject,
            start_time: req.start_time,
            end_time: req.end_time,
            description: req.description,
            status: req
                .status
                .as_deref()
                .map(str::parse::<SessionStatus>)
                .transpose()?,
            progress: req.progress.map(checked_progress).transpose()?,
        })
    }
}

fn checked_progress(progress: u32) -> Result<u8, SessionError> {
    u8::try_from(progress)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(SessionError::ProgressOutOfRange(progress))
}

/// Optional start-time window for listing sessions.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionRange {
    /// Only sessions starting at or after this instant (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Only sessions starting before this instant (RFC 3339).
    pub to: Option<DateTime<Utc>>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List the user's sessions, oldest first. Creates the user's plan on first use.
#[utoipa::path(
    get,
    path = "/api/study-sessions",
    params(SessionRange),
    responses(
        (status = 200, description = "Sessions ordered by start time", body = Vec<SessionResponse>),
        (status = 400, description = "Invalid range", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    range: Result<Query<SessionRange>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Query(range) = range.map_err(|e| bad_request(e.body_text()))?;
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from >= to {
            return Err(bad_request("'from' must be before 'to'"));
        }
    }

    let plan = state
        .db
        .get_or_create_plan(user_id)
        .await
        .map_err(|e| port_error("Failed to load study plan", e))?;

    let sessions = if range.from.is_none() && range.to.is_none() {
        plan.sessions
    } else {
        state
            .db
            .list_sessions(user_id, range.from, range.to)
            .await
            .map_err(|e| port_error("Failed to list sessions", e))?
    };

    let body: Vec<SessionResponse> = sessions.into_iter().map(SessionResponse::from).collect();
    Ok(Json(body))
}

/// Create a session.
#[utoipa::path(
    post,
    path = "/api/study-sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Invalid session", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;
    let new_session = NewStudySession::try_from(req).map_err(|e| bad_request(e.to_string()))?;

    let session = state
        .db
        .create_session(user_id, &new_session)
        .await
        .map_err(|e| port_error("Failed to create session", e))?;
    info!(session_id = %session.id, subject = %session.subject, "Created study session");

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// Fetch one session.
#[utoipa::path(
    get,
    path = "/api/study-sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session", body = SessionResponse),
        (status = 404, description = "No such session", body = ErrorBody)
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = state
        .db
        .get_session(user_id, session_id)
        .await
        .map_err(|e| port_error("Failed to fetch session", e))?;
    Ok(Json(SessionResponse::from(session)))
}

/// Update some fields of a session. Completing it without a progress value sets progress to 100.
#[utoipa::path(
    put,
    path = "/api/study-sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "The updated session", body = SessionResponse),
        (status = 400, description = "Invalid update", body = ErrorBody),
        (status = 404, description = "No such session", body = ErrorBody)
    )
)]
pub async fn update_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
    payload: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;
    let update = SessionUpdate::try_from(req).map_err(|e| bad_request(e.to_string()))?;

    let existing = state
        .db
        .get_session(user_id, session_id)
        .await
        .map_err(|e| port_error("Failed to fetch session", e))?;
    let updated = update
        .apply_to(&existing)
        .map_err(|e| bad_request(e.to_string()))?;

    let saved = state
        .db
        .save_session(user_id, &updated)
        .await
        .map_err(|e| port_error("Failed to update session", e))?;
    Ok(Json(SessionResponse::from(saved)))
}

/// Delete a session.
#[utoipa::path(
    delete,
    path = "/api/study-sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "No such session", body = ErrorBody)
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .db
        .delete_session(user_id, session_id)
        .await
        .map_err(|e| port_error("Failed to delete session", e))?;
    Ok(StatusCode::NO_CONTENT)
}
