//! services/api/src/web/notes.rs
//!
//! Upload, list and delete study notes, and the subject overview derived
//! from notes and sessions.

use axum::{
    extract::{rejection::QueryRejection, Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::domain::{derive_subjects, Note, Subject};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::rest::{bad_request, port_error, ErrorBody, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: Uuid,
    pub subject: String,
    pub title: String,
    pub file_url: String,
    pub public_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            subject: note.subject,
            title: note.title,
            file_url: note.file_url,
            public_id: note.public_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResponse {
    pub name: String,
    pub color: String,
    pub documents_count: usize,
    /// Mean progress of the subject's sessions, 0 to 100.
    pub progress: u8,
}

impl From<Subject> for SubjectResponse {
    fn from(subject: Subject) -> Self {
        Self {
            name: subject.name,
            color: subject.color.to_string(),
            documents_count: subject.documents_count,
            progress: subject.progress,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NoteFilter {
    /// Only notes for this subject, matched case-insensitively.
    pub subject: Option<String>,
}

/// The parts of an upload form, read out of the multipart stream.
#[derive(Default)]
struct UploadForm {
    subject: Option<String>,
    title: Option<String>,
    file: Option<(String, Bytes)>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, HandlerError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("subject") => {
                form.subject = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            Some("title") => {
                form.title = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file bytes: {}", e)))?;
                form.file = Some((name, data));
            }
            _ => {}
        }
    }
    Ok(form)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Upload a note.
///
/// Multipart form with `subject`, an optional `title` (defaults to the file
/// name) and a `file` part.
#[utoipa::path(
    post,
    path = "/api/notes",
    request_body(content_type = "multipart/form-data", description = "Fields `subject`, `title` and `file`."),
    responses(
        (status = 201, description = "Note stored", body = NoteResponse),
        (status = 400, description = "Missing subject or file", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn upload_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let form = read_upload_form(multipart).await?;

    let subject = form
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Subject is required"))?;
    let (file_name, data) = form
        .file
        .ok_or_else(|| bad_request("Multipart form must include a file"))?;
    if data.is_empty() {
        return Err(bad_request("Uploaded file is empty"));
    }
    let title = form
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_name.clone());

    let stored = state
        .storage
        .store(&file_name, &data)
        .await
        .map_err(|e| port_error("Failed to store file", e))?;

    let now = Utc::now();
    let note = Note {
        id: Uuid::new_v4(),
        user_id,
        subject,
        title,
        file_url: stored.url,
        public_id: stored.public_id,
        created_at: now,
        updated_at: now,
    };

    let saved = match state.db.create_note(&note).await {
        Ok(saved) => saved,
        Err(e) => {
            if let Err(cleanup) = state.storage.remove(&note.public_id).await {
                error!(public_id = %note.public_id, "Failed to remove orphaned file: {}", cleanup);
            }
            return Err(port_error("Failed to save note", e));
        }
    };
    info!(note_id = %saved.id, bytes = data.len(), "Uploaded note");

    Ok((StatusCode::CREATED, Json(NoteResponse::from(saved))))
}

/// List the user's notes, newest first.
#[utoipa::path(
    get,
    path = "/api/notes",
    params(NoteFilter),
    responses(
        (status = 200, description = "Notes", body = Vec<NoteResponse>),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    filter: Result<Query<NoteFilter>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Query(filter) = filter.map_err(|e| bad_request(e.body_text()))?;
    let subject = filter.subject.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let notes = state
        .db
        .list_notes(user_id, subject)
        .await
        .map_err(|e| port_error("Failed to list notes", e))?;
    let body: Vec<NoteResponse> = notes.into_iter().map(NoteResponse::from).collect();
    Ok(Json(body))
}

/// Delete a note: the stored file first, then the record.
#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    params(("id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 404, description = "No such note", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn delete_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let note = state
        .db
        .get_note(user_id, note_id)
        .await
        .map_err(|e| port_error("Failed to fetch note", e))?;

    state
        .storage
        .remove(&note.public_id)
        .await
        .map_err(|e| port_error("Failed to remove stored file", e))?;
    state
        .db
        .delete_note(user_id, note_id)
        .await
        .map_err(|e| port_error("Failed to delete note", e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Subjects the user has notes or sessions for, with document counts and progress.
#[utoipa::path(
    get,
    path = "/api/subjects",
    responses(
        (status = 200, description = "Subjects sorted by name", body = Vec<SubjectResponse>),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_subjects_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let notes = state
        .db
        .list_notes(user_id, None)
        .await
        .map_err(|e| port_error("Failed to list notes", e))?;
    let sessions = state
        .db
        .list_sessions(user_id, None, None)
        .await
        .map_err(|e| port_error("Failed to list sessions", e))?;

    let subjects = derive_subjects(&notes, &sessions);
    let body: Vec<SubjectResponse> = subjects.into_iter().map(SubjectResponse::from).collect();
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{read_json, send, test_app};
    use axum::{body::Body, http::Request};
    use serde_json::json;
    use tower::ServiceExt;

    const BOUNDARY: &str = "planner-test-boundary";

    fn upload_request(
        token: &str,
        subject: Option<&str>,
        file: Option<(&str, &str)>,
    ) -> Request<Body> {
        let mut body = String::new();
        if let Some(subject) = subject {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"subject\"\r\n\r\n{subject}\r\n"
            ));
        }
        if let Some((name, contents)) = file {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n{contents}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/api/notes")
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_list_and_delete_a_note() {
        let app = test_app();
        let token = app.token_for_new_user().await;

        let res = app
            .router
            .clone()
            .oneshot(upload_request(&token, Some("Biology"), Some(("cells.pdf", "%PDF-1.4 cells"))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let note: NoteResponse = read_json(res).await;
        assert_eq!(note.title, "cells.pdf");
        assert!(app.storage.contains(&note.public_id));

        let res = send(&app.router, "GET", "/api/notes?subject=biology", Some(&token), None).await;
        let notes: Vec<NoteResponse> = read_json(res).await;
        assert_eq!(notes.len(), 1);

        let res = send(
            &app.router,
            "GET",
            "/api/notes?subject=Chemistry",
            Some(&token),
            None,
        )
        .await;
        let notes: Vec<NoteResponse> = read_json(res).await;
        assert!(notes.is_empty());

        let uri = format!("/api/notes/{}", note.id);
        let res = send(&app.router, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(!app.storage.contains(&note.public_id));

        let res = send(&app.router, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_requires_subject_and_file() {
        let app = test_app();
        let token = app.token_for_new_user().await;

        let res = app
            .router
            .clone()
            .oneshot(upload_request(&token, None, Some(("cells.pdf", "data"))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .router
            .clone()
            .oneshot(upload_request(&token, Some("Biology"), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subjects_combine_notes_and_sessions() {
        let app = test_app();
        let token = app.token_for_new_user().await;

        let res = app
            .router
            .clone()
            .oneshot(upload_request(&token, Some("Physics"), Some(("waves.pdf", "waves"))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = send(
            &app.router,
            "POST",
            "/api/study-sessions",
            Some(&token),
            Some(json!({
                "subject": "physics",
                "startTime": "2025-01-27T09:00:00Z",
                "endTime": "2025-01-27T10:00:00Z",
                "progress": 40
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = send(&app.router, "GET", "/api/subjects", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let subjects: Vec<SubjectResponse> = read_json(res).await;
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].name, "Physics");
        assert_eq!(subjects[0].documents_count, 1);
        assert_eq!(subjects[0].progress, 40);
    }
}
