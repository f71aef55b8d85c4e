//! services/api/src/web/study_plan.rs
//!
//! Read and edit the metadata of the user's study plan.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::domain::{PlanDetails, StudyPlan};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{bad_request, invalid_body, port_error, ErrorBody, HandlerError};
use crate::web::sessions::SessionResponse;
use crate::web::state::AppState;

const MAX_WEEKLY_GOAL_HOURS: u32 = 168;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Target study hours per week.
    pub weekly_goal: u32,
    pub subjects: Vec<String>,
    pub sessions: Vec<SessionResponse>,
}

impl From<StudyPlan> for PlanResponse {
    fn from(plan: StudyPlan) -> Self {
        Self {
            id: plan.id,
            title: plan.title,
            description: plan.description,
            weekly_goal: plan.weekly_goal,
            subjects: plan.subjects,
            sessions: plan.sessions.into_iter().map(SessionResponse::from).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weekly_goal: Option<u32>,
    pub subjects: Option<Vec<String>>,
}

impl UpdatePlanRequest {
    fn into_details(self) -> Result<PlanDetails, String> {
        if let Some(goal) = self.weekly_goal {
            if goal > MAX_WEEKLY_GOAL_HOURS {
                return Err(format!("Weekly goal must be at most 168 hours, got {}", goal));
            }
        }
        let subjects = self.subjects.map(|subjects| {
            let mut cleaned: Vec<String> = Vec::with_capacity(subjects.len());
            for subject in subjects {
                let subject = subject.trim().to_string();
                if !subject.is_empty() && !cleaned.contains(&subject) {
                    cleaned.push(subject);
                }
            }
            cleaned
        });
        Ok(PlanDetails {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description,
            weekly_goal: self.weekly_goal,
            subjects,
        })
    }
}

/// Fetch the user's plan with all of its sessions.
#[utoipa::path(
    get,
    path = "/api/study-plan",
    responses(
        (status = 200, description = "The user's plan", body = PlanResponse),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn get_plan_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let plan = state
        .db
        .get_or_create_plan(user_id)
        .await
        .map_err(|e| port_error("Failed to load study plan", e))?;
    Ok(Json(PlanResponse::from(plan)))
}

/// Update the plan's title, description, weekly goal or subjects.
#[utoipa::path(
    put,
    path = "/api/study-plan",
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "The updated plan", body = PlanResponse),
        (status = 400, description = "Invalid update", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn update_plan_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<UpdatePlanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;
    let details = req.into_details().map_err(bad_request)?;

    let plan = state
        .db
        .update_plan(user_id, &details)
        .await
        .map_err(|e| port_error("Failed to update study plan", e))?;
    Ok(Json(PlanResponse::from(plan)))
}
