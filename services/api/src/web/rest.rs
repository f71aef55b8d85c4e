//! services/api/src/web/rest.rs
//!
//! Shared pieces of the REST API: the error body every handler answers with,
//! the helpers that build it, and the master definition for the OpenAPI
//! specification.

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use study_planner_core::ports::PortError;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};

use crate::web::{auth, groq, notes, sessions, study_plan};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        sessions::list_sessions_handler,
        sessions::create_session_handler,
        sessions::get_session_handler,
        sessions::update_session_handler,
        sessions::delete_session_handler,
        study_plan::get_plan_handler,
        study_plan::update_plan_handler,
        groq::generate_plan_handler,
        groq::summary_handler,
        groq::quiz_handler,
        notes::upload_note_handler,
        notes::list_notes_handler,
        notes::delete_note_handler,
        notes::list_subjects_handler,
    ),
    components(
        schemas(
            ErrorBody,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            sessions::SessionResponse,
            sessions::CreateSessionRequest,
            sessions::UpdateSessionRequest,
            study_plan::PlanResponse,
            study_plan::UpdatePlanRequest,
            groq::GeneratePlanRequest,
            groq::GeneratePlanResponse,
            groq::SummaryRequest,
            groq::SummaryResponse,
            groq::QuizRequest,
            groq::QuizResponse,
            notes::NoteResponse,
            notes::SubjectResponse,
        )
    ),
    tags(
        (name = "Study Planner API", description = "Study sessions, notes and AI-generated study plans.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Body & Helpers
//=========================================================================================

/// The body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// What a failing handler returns.
pub type HandlerError = (StatusCode, Json<ErrorBody>);

pub fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: Option<String>,
) -> HandlerError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            details,
        }),
    )
}

pub fn bad_request(error: impl Into<String>) -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, error, None)
}

/// Turns a body that failed to deserialize into a 400.
pub fn invalid_body(rejection: JsonRejection) -> HandlerError {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(
        StatusCode::BAD_REQUEST,
        "Invalid request body",
        Some(rejection.body_text()),
    )
}

/// Maps a port failure onto a status code. `context` names the operation that failed.
pub fn port_error(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(what) => error_response(StatusCode::NOT_FOUND, what, None),
        PortError::Unauthorized => error_response(StatusCode::UNAUTHORIZED, "Unauthorized", None),
        PortError::Conflict(what) => error_response(StatusCode::CONFLICT, what, None),
        other => {
            error!("{}: {}", context, other);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                context,
                Some(other.to_string()),
            )
        }
    }
}
