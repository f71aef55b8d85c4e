//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use study_planner_core::domain::{
    NewStudySession, Note, PlanDetails, StudyPlan, StudySession, User, UserCredentials,
};
use study_planner_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Returns the id of the user's plan, creating the plan if needed.
    async fn ensure_plan(&self, user_id: Uuid) -> PortResult<Uuid> {
        sqlx::query(
            "INSERT INTO study_plans (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM study_plans WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn fetch_plan(&self, user_id: Uuid) -> PortResult<StudyPlan> {
        let record = sqlx::query_as::<_, PlanRecord>(
            "SELECT id, user_id, title, description, weekly_goal, subjects FROM study_plans WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, || format!("Study plan for user {} not found", user_id))
        })?;

        let sessions = self.list_sessions(user_id, None, None).await?;
        Ok(record.to_domain(sessions))
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SESSION_COLUMNS: &str =
    "id, subject, start_time, end_time, description, status, progress, is_ai_generated";
const NOTE_COLUMNS: &str =
    "id, user_id, subject, title, file_url, public_id, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct PlanRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    weekly_goal: i32,
    subjects: Vec<String>,
}
impl PlanRecord {
    fn to_domain(self, sessions: Vec<StudySession>) -> StudyPlan {
        StudyPlan {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            weekly_goal: u32::try_from(self.weekly_goal).unwrap_or(0),
            subjects: self.subjects,
            sessions,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    subject: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    description: String,
    status: String,
    progress: i32,
    is_ai_generated: bool,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<StudySession> {
        let status = self
            .status
            .parse()
            .map_err(|e: study_planner_core::SessionError| PortError::Unexpected(e.to_string()))?;
        Ok(StudySession {
            id: self.id,
            subject: self.subject,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description,
            status,
            progress: u8::try_from(self.progress.clamp(0, 100)).unwrap_or(0),
            is_ai_generated: self.is_ai_generated,
        })
    }
}

#[derive(FromRow)]
struct NoteRecord {
    id: Uuid,
    user_id: Uuid,
    subject: String,
    title: String,
    file_url: String,
    public_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl NoteRecord {
    fn to_domain(self) -> Note {
        Note {
            id: self.id,
            user_id: self.user_id,
            subject: self.subject,
            title: self.title,
            file_url: self.file_url,
            public_id: self.public_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unique_violation = e
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == "23505");
            if unique_violation {
                PortError::Conflict(format!("An account for {} already exists", email))
            } else {
                PortError::Unexpected(e.to_string())
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_or_create_plan(&self, user_id: Uuid) -> PortResult<StudyPlan> {
        self.ensure_plan(user_id).await?;
        self.fetch_plan(user_id).await
    }

    async fn update_plan(&self, user_id: Uuid, details: &PlanDetails) -> PortResult<StudyPlan> {
        self.ensure_plan(user_id).await?;
        let weekly_goal = details
            .weekly_goal
            .map(|goal| i32::try_from(goal).unwrap_or(i32::MAX));
        sqlx::query(
            "UPDATE study_plans SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                weekly_goal = COALESCE($4, weekly_goal), \
                subjects = COALESCE($5, subjects), \
                updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(details.title.as_deref())
        .bind(details.description.as_deref())
        .bind(weekly_goal)
        .bind(details.subjects.as_ref())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        self.fetch_plan(user_id).await
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> PortResult<Vec<StudySession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM study_sessions \
             WHERE user_id = $1 \
               AND ($2::timestamptz IS NULL OR start_time >= $2) \
               AND ($3::timestamptz IS NULL OR start_time < $3) \
             ORDER BY start_time ASC"
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<StudySession> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE id = $1 AND user_id = $2");
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(e, || format!("Session {} not found", session_id))
            })?;
        record.to_domain()
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        session: &NewStudySession,
    ) -> PortResult<StudySession> {
        let plan_id = self.ensure_plan(user_id).await?;
        let sql = format!(
            "INSERT INTO study_sessions \
                (id, plan_id, user_id, subject, start_time, end_time, description, status, progress, is_ai_generated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(plan_id)
            .bind(user_id)
            .bind(&session.subject)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(&session.description)
            .bind(session.status.as_str())
            .bind(i32::from(session.progress))
            .bind(session.is_ai_generated)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn save_session(
        &self,
        user_id: Uuid,
        session: &StudySession,
    ) -> PortResult<StudySession> {
        let sql = format!(
            "UPDATE study_sessions SET \
                subject = $3, start_time = $4, end_time = $5, description = $6, \
                status = $7, progress = $8, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session.id)
            .bind(user_id)
            .bind(&session.subject)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(&session.description)
            .bind(session.status.as_str())
            .bind(i32::from(session.progress))
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;
        record.to_domain()
    }

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM study_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn create_note(&self, note: &Note) -> PortResult<Note> {
        let sql = format!(
            "INSERT INTO notes (id, user_id, subject, title, file_url, public_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {NOTE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, NoteRecord>(&sql)
            .bind(note.id)
            .bind(note.user_id)
            .bind(&note.subject)
            .bind(&note.title)
            .bind(&note.file_url)
            .bind(&note.public_id)
            .bind(note.created_at)
            .bind(note.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_notes(&self, user_id: Uuid, subject: Option<&str>) -> PortResult<Vec<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes \
             WHERE user_id = $1 AND ($2::text IS NULL OR LOWER(subject) = LOWER($2)) \
             ORDER BY created_at DESC"
        );
        let records = sqlx::query_as::<_, NoteRecord>(&sql)
            .bind(user_id)
            .bind(subject)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<Note> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2");
        let record = sqlx::query_as::<_, NoteRecord>(&sql)
            .bind(note_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Note {} not found", note_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Note {} not found", note_id)));
        }
        Ok(())
    }
}
