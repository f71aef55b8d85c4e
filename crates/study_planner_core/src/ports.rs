//! crates/study_planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    NewStudySession, Note, PlanDetails, StudyPlan, StudySession, User, UserCredentials,
};
use crate::plan::AiGeneratedPlan;
use crate::preferences::PlanRequest;
use crate::prompt::Prompt;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The remote service answered with an error of its own.
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owner of an unexpired auth session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Study Plan ---
    /// Fetches the user's plan with its sessions, creating an empty plan on first use.
    async fn get_or_create_plan(&self, user_id: Uuid) -> PortResult<StudyPlan>;

    async fn update_plan(&self, user_id: Uuid, details: &PlanDetails) -> PortResult<StudyPlan>;

    // --- Study Sessions ---
    /// Lists sessions ordered by start time, optionally limited to those starting
    /// within `[from, to)`.
    async fn list_sessions(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> PortResult<Vec<StudySession>>;

    async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<StudySession>;

    async fn create_session(
        &self,
        user_id: Uuid,
        session: &NewStudySession,
    ) -> PortResult<StudySession>;

    /// Overwrites an existing session with `session`.
    async fn save_session(&self, user_id: Uuid, session: &StudySession)
        -> PortResult<StudySession>;

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()>;

    // --- Notes ---
    async fn create_note(&self, note: &Note) -> PortResult<Note>;

    async fn list_notes(&self, user_id: Uuid, subject: Option<&str>) -> PortResult<Vec<Note>>;

    async fn get_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<Note>;

    async fn delete_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends a prompt to the language model and returns its raw text reply.
    async fn complete(&self, prompt: &Prompt) -> PortResult<String>;
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
    /// Key used to remove the object later.
    pub public_id: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, file_name: &str, data: &[u8]) -> PortResult<StoredFile>;

    async fn remove(&self, public_id: &str) -> PortResult<()>;
}

/// The client's view of the HTTP API, used by the plan generation flow.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn list_sessions(&self) -> PortResult<Vec<StudySession>>;

    async fn create_session(&self, session: &NewStudySession) -> PortResult<StudySession>;

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;

    async fn request_plan(&self, request: &PlanRequest) -> PortResult<AiGeneratedPlan>;
}
