//! services/api/src/web/groq.rs
//!
//! The AI endpoints: study plan generation, summaries and quizzes. Each one
//! builds a prompt, sends it to the completion service and checks the reply
//! before anything reaches the client.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::{
    parse_plan_response,
    plan::AiGeneratedPlan,
    preferences::{PlanPreferences, PlanRequest},
    prompt::{build_plan_prompt, build_quiz_prompt, build_summary_prompt},
    quiz::{
        parse_quiz_response, Quiz, DEFAULT_QUIZ_QUESTIONS, MAX_QUIZ_QUESTIONS, MIN_QUIZ_QUESTIONS,
    },
};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{
    bad_request, error_response, invalid_body, port_error, ErrorBody, HandlerError,
};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Study preferences for plan generation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlanRequest {
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Study hours per week, 1 to 40.
    pub hours: Option<u32>,
    /// `morning`, `afternoon`, `evening`, `night` or `flexible`.
    pub preference: Option<String>,
    /// Plan length in weeks, 1 to 52. At most 8 weeks are generated.
    pub weeks: Option<u32>,
    pub goals: Option<String>,
    /// Minutes per session, 15 to 240.
    pub session_length: Option<u32>,
    /// Minutes between sessions, up to 120.
    pub break_length: Option<u32>,
    #[serde(default)]
    pub preferred_days: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    pub exam_dates: Option<String>,
}

impl From<GeneratePlanRequest> for PlanRequest {
    fn from(req: GeneratePlanRequest) -> Self {
        PlanRequest {
            subjects: req.subjects,
            hours: req.hours,
            preference: req.preference,
            weeks: req.weeks,
            goals: req.goals,
            session_length: req.session_length,
            break_length: req.break_length,
            preferred_days: req.preferred_days,
            focus_areas: req.focus_areas,
            exam_dates: req.exam_dates,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GeneratePlanResponse {
    pub success: bool,
    /// `{ weeks: [ { weekNumber, sessions: [ { subject, startTime, endTime, description, learningStyle } ] } ] }`
    #[schema(value_type = Object)]
    pub plan: AiGeneratedPlan,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryRequest {
    #[serde(default)]
    pub text: String,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    #[serde(default)]
    pub text: String,
    /// 1 to 20, default 5.
    pub num_questions: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuizResponse {
    pub success: bool,
    /// `{ questions: [ { question, options, answer, explanation } ] }`
    #[schema(value_type = Object)]
    pub quiz: Quiz,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Generate a study plan from the user's preferences.
///
/// The plan is returned, not stored: the client creates the sessions it wants.
#[utoipa::path(
    post,
    path = "/api/groq/studyplan",
    request_body = GeneratePlanRequest,
    responses(
        (status = 200, description = "Plan generated", body = GeneratePlanResponse),
        (status = 400, description = "Invalid preferences", body = ErrorBody),
        (status = 409, description = "A generation is already running for this user", body = ErrorBody),
        (status = 500, description = "The AI call failed or its reply could not be recovered", body = ErrorBody)
    )
)]
pub async fn generate_plan_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<GeneratePlanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    // 1. Validate preferences before any LLM call
    let Json(req) = payload.map_err(invalid_body)?;
    let prefs = PlanPreferences::try_from(PlanRequest::from(req))
        .map_err(|e| bad_request(e.to_string()))?;

    // 2. One generation per user at a time
    let Some(_permit) = state.generations.try_acquire(user_id) else {
        warn!(user_id = %user_id, "Rejected overlapping plan generation");
        return Err(error_response(
            StatusCode::CONFLICT,
            "A study plan is already being generated",
            None,
        ));
    };

    // 3. Ask the model
    let prompt = build_plan_prompt(&prefs, Utc::now().date_naive());
    info!(
        user_id = %user_id,
        subjects = prefs.subjects.len(),
        weeks = prompt.week_cap,
        "Requesting study plan"
    );
    let raw = state
        .completion
        .complete(&prompt)
        .await
        .map_err(|e| port_error("Failed to generate study plan", e))?;

    // 4. Recover the plan from the reply
    let repaired = parse_plan_response(&raw).map_err(|e| {
        error!(length = raw.len(), "Failed to parse study plan response: {}", e);
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to parse AI response",
            Some(e.to_string()),
        )
    })?;
    info!(stage = %repaired.stage, length = raw.len(), "Recovered study plan");

    let unknown = repaired.plan.unknown_subjects(&prefs.subjects);
    if !unknown.is_empty() {
        warn!(?unknown, "Plan mentions subjects that were not requested");
    }

    let message = format!(
        "Generated {} sessions over {} week(s)",
        repaired.plan.session_count(),
        repaired.plan.weeks.len()
    );
    Ok(Json(GeneratePlanResponse {
        success: true,
        plan: repaired.plan,
        message,
    }))
}

/// Summarise study material into revision notes.
#[utoipa::path(
    post,
    path = "/api/groq/summary",
    request_body = SummaryRequest,
    responses(
        (status = 200, description = "Summary generated", body = SummaryResponse),
        (status = 400, description = "No text supplied", body = ErrorBody),
        (status = 500, description = "The AI call failed", body = ErrorBody)
    )
)]
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;
    if req.text.trim().is_empty() {
        return Err(bad_request("Text is required"));
    }

    let subject = req.subject.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let prompt = build_summary_prompt(&req.text, subject);
    let summary = state
        .completion
        .complete(&prompt)
        .await
        .map_err(|e| port_error("Failed to generate summary", e))?;

    Ok(Json(SummaryResponse {
        success: true,
        summary: summary.trim().to_string(),
    }))
}

/// Write a multiple-choice quiz about study material.
#[utoipa::path(
    post,
    path = "/api/groq/quiz",
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Quiz generated", body = QuizResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 500, description = "The AI call failed or returned an unusable quiz", body = ErrorBody)
    )
)]
pub async fn quiz_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;
    if req.text.trim().is_empty() {
        return Err(bad_request("Text is required"));
    }
    let num_questions = req.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS);
    if !(MIN_QUIZ_QUESTIONS..=MAX_QUIZ_QUESTIONS).contains(&num_questions) {
        return Err(bad_request(format!(
            "Number of questions must be between 1 and 20, got {}",
            num_questions
        )));
    }

    let prompt = build_quiz_prompt(&req.text, num_questions);
    let raw = state
        .completion
        .complete(&prompt)
        .await
        .map_err(|e| port_error("Failed to generate quiz", e))?;

    let quiz = parse_quiz_response(&raw).map_err(|e| {
        error!(length = raw.len(), "Failed to parse quiz response: {}", e);
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to parse AI response",
            Some(e.to_string()),
        )
    })?;

    Ok(Json(QuizResponse {
        success: true,
        quiz,
    }))
}
