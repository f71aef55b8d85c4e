//! services/api/src/test_support.rs
//!
//! In-memory stand-ins for the service ports and helpers for driving the
//! router in handler tests.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use study_planner_core::domain::{
    NewStudySession, Note, PlanDetails, StudyPlan, StudySession, User, UserCredentials,
};
use study_planner_core::ports::{
    CompletionService, DatabaseService, FileStorage, PortError, PortResult, StoredFile,
};
use study_planner_core::prompt::Prompt;
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::Config;
use crate::web::{api_router, state::AppState};

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct DbState {
    users: Vec<UserCredentials>,
    tokens: HashMap<String, (Uuid, DateTime<Utc>)>,
    plans: HashMap<Uuid, StudyPlan>,
    sessions: Vec<(Uuid, StudySession)>,
    notes: Vec<Note>,
}

impl DbState {
    fn plan_for(&mut self, user_id: Uuid) -> &mut StudyPlan {
        self.plans.entry(user_id).or_insert_with(|| StudyPlan {
            id: Uuid::new_v4(),
            user_id,
            title: "My Study Plan".to_string(),
            description: String::new(),
            weekly_goal: 10,
            subjects: Vec::new(),
            sessions: Vec::new(),
        })
    }

    fn sessions_of(&self, user_id: Uuid) -> Vec<StudySession> {
        let mut sessions: Vec<StudySession> = self
            .sessions
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, s)| s.clone())
            .collect();
        sessions.sort_by_key(|s| s.start_time);
        sessions
    }

    fn plan_with_sessions(&mut self, user_id: Uuid) -> StudyPlan {
        let sessions = self.sessions_of(user_id);
        let mut plan = self.plan_for(user_id).clone();
        plan.sessions = sessions;
        plan
    }
}

#[derive(Default)]
pub struct InMemoryDb {
    state: Mutex<DbState>,
}

impl InMemoryDb {
    fn state(&self) -> std::sync::MutexGuard<'_, DbState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("An account for {} already exists", email)));
        }
        let user_id = Uuid::new_v4();
        state.users.push(UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: email.to_string(),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.state()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.state()
            .tokens
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.state().tokens.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state().tokens.remove(session_id);
        Ok(())
    }

    async fn get_or_create_plan(&self, user_id: Uuid) -> PortResult<StudyPlan> {
        Ok(self.state().plan_with_sessions(user_id))
    }

    async fn update_plan(&self, user_id: Uuid, details: &PlanDetails) -> PortResult<StudyPlan> {
        let mut state = self.state();
        let plan = state.plan_for(user_id);
        if let Some(title) = &details.title {
            plan.title = title.clone();
        }
        if let Some(description) = &details.description {
            plan.description = description.clone();
        }
        if let Some(goal) = details.weekly_goal {
            plan.weekly_goal = goal;
        }
        if let Some(subjects) = &details.subjects {
            plan.subjects = subjects.clone();
        }
        Ok(state.plan_with_sessions(user_id))
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> PortResult<Vec<StudySession>> {
        Ok(self
            .state()
            .sessions_of(user_id)
            .into_iter()
            .filter(|s| from.map_or(true, |from| s.start_time >= from))
            .filter(|s| to.map_or(true, |to| s.start_time < to))
            .collect())
    }

    async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<StudySession> {
        self.state()
            .sessions
            .iter()
            .find(|(owner, s)| *owner == user_id && s.id == session_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        session: &NewStudySession,
    ) -> PortResult<StudySession> {
        let mut state = self.state();
        state.plan_for(user_id);
        let created = session.clone().into_session(Uuid::new_v4());
        state.sessions.push((user_id, created.clone()));
        Ok(created)
    }

    async fn save_session(
        &self,
        user_id: Uuid,
        session: &StudySession,
    ) -> PortResult<StudySession> {
        let mut state = self.state();
        let slot = state
            .sessions
            .iter_mut()
            .find(|(owner, s)| *owner == user_id && s.id == session.id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;
        slot.1 = session.clone();
        Ok(session.clone())
    }

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<()> {
        let mut state = self.state();
        let before = state.sessions.len();
        state
            .sessions
            .retain(|(owner, s)| !(*owner == user_id && s.id == session_id));
        if state.sessions.len() == before {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn create_note(&self, note: &Note) -> PortResult<Note> {
        self.state().notes.push(note.clone());
        Ok(note.clone())
    }

    async fn list_notes(&self, user_id: Uuid, subject: Option<&str>) -> PortResult<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .state()
            .notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| subject.map_or(true, |s| n.subject.eq_ignore_ascii_case(s)))
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn get_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<Note> {
        self.state()
            .notes
            .iter()
            .find(|n| n.user_id == user_id && n.id == note_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Note {} not found", note_id)))
    }

    async fn delete_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<()> {
        let mut state = self.state();
        let before = state.notes.len();
        state.notes.retain(|n| !(n.user_id == user_id && n.id == note_id));
        if state.notes.len() == before {
            return Err(PortError::NotFound(format!("Note {} not found", note_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// Completion
//=========================================================================================

/// Answers prompts from a queue of canned replies and records every prompt.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<PortResult<String>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedCompletion {
    pub fn push_reply(&self, reply: PortResult<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &Prompt) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Upstream("no scripted reply left".to_string())))
    }
}

//=========================================================================================
// File Storage
//=========================================================================================

#[derive(Default)]
pub struct InMemoryStorage {
    files: Mutex<HashSet<String>>,
}

impl InMemoryStorage {
    pub fn contains(&self, public_id: &str) -> bool {
        self.files.lock().unwrap().contains(public_id)
    }
}

#[async_trait]
impl FileStorage for InMemoryStorage {
    async fn store(&self, file_name: &str, _data: &[u8]) -> PortResult<StoredFile> {
        let public_id = format!("{}-{}", Uuid::new_v4(), file_name);
        self.files.lock().unwrap().insert(public_id.clone());
        Ok(StoredFile {
            url: format!("http://localhost:5000/uploads/{}", public_id),
            public_id,
        })
    }

    async fn remove(&self, public_id: &str) -> PortResult<()> {
        self.files.lock().unwrap().remove(public_id);
        Ok(())
    }
}

//=========================================================================================
// Router Harness
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDb>,
    pub completion: Arc<ScriptedCompletion>,
    pub storage: Arc<InMemoryStorage>,
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/planner_test".to_string()),
        "GROQ_API_KEY" => Some("gsk_test".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn test_app() -> TestApp {
    let db = Arc::new(InMemoryDb::default());
    let completion = Arc::new(ScriptedCompletion::default());
    let storage = Arc::new(InMemoryStorage::default());
    let state = Arc::new(AppState::new(
        db.clone(),
        Arc::new(test_config()),
        completion.clone(),
        storage.clone(),
    ));
    TestApp {
        router: api_router(state.clone()),
        state,
        db,
        completion,
        storage,
    }
}

impl TestApp {
    /// Registers a user directly in the fake database and returns a valid token.
    pub async fn new_user(&self) -> (Uuid, String) {
        let email = format!("{}@example.com", Uuid::new_v4());
        let user = self.db.create_user_with_email(&email, "not-a-hash").await.unwrap();
        let token = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&token, user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        (user.user_id, token)
    }

    pub async fn token_for_new_user(&self) -> String {
        self.new_user().await.1
    }

    /// Sends a body verbatim, for exercising malformed JSON.
    pub async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &str,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }
}

/// Sends a request through the router, with an optional bearer token and JSON body.
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
