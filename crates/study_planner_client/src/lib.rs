//! crates/study_planner_client/src/lib.rs
//!
//! An HTTP implementation of the `SessionGateway` port that talks to the
//! study planner API with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use study_planner_core::{
    domain::{NewStudySession, StudySession},
    plan::AiGeneratedPlan,
    ports::{PortError, PortResult, SessionGateway},
    preferences::PlanRequest,
};
use tracing::debug;
use uuid::Uuid;

/// Plan generation waits on the LLM, so requests get more room than usual.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

//=========================================================================================
// Configuration & Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
}

impl From<ClientError> for PortError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Api { status, message } => match status {
                StatusCode::UNAUTHORIZED => PortError::Unauthorized,
                StatusCode::NOT_FOUND => PortError::NotFound(message),
                StatusCode::CONFLICT => PortError::Conflict(message),
                _ => PortError::Upstream(message),
            },
            ClientError::Http(e) if e.is_timeout() => PortError::Timeout(e.to_string()),
            other => PortError::Unexpected(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
}

impl ClientConfig {
    /// Reads `STUDY_PLANNER_URL` (default `http://localhost:5000`) and `STUDY_PLANNER_TOKEN`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("STUDY_PLANNER_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        let token = lookup("STUDY_PLANNER_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClientError::MissingVar("STUDY_PLANNER_TOKEN".to_string()))?;
        Ok(Self { base_url, token })
    }
}

/// Shape of the API's error responses.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Deserialize)]
struct PlanEnvelope {
    plan: AiGeneratedPlan,
}

/// Builds a readable message from an error response body, falling back to the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{}: {}", error, details),
        Ok(ErrorBody { error, details: None }) => error,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

//=========================================================================================
// The Gateway
//=========================================================================================

#[derive(Clone)]
pub struct HttpSessionGateway {
    client: Client,
    config: ClientConfig,
}

impl HttpSessionGateway {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.config.token))
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status,
            message: error_message(status, &body),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.authorized(request).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn list_sessions(&self) -> PortResult<Vec<StudySession>> {
        let sessions = self
            .send_json(self.client.get(self.url("/api/study-sessions")))
            .await?;
        Ok(sessions)
    }

    async fn create_session(&self, session: &NewStudySession) -> PortResult<StudySession> {
        let created = self
            .send_json(self.client.post(self.url("/api/study-sessions")).json(session))
            .await?;
        Ok(created)
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        let url = self.url(&format!("/api/study-sessions/{}", session_id));
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .map_err(ClientError::from)?;
        Self::check(response).await?;
        debug!(session_id = %session_id, "Deleted session");
        Ok(())
    }

    async fn request_plan(&self, request: &PlanRequest) -> PortResult<AiGeneratedPlan> {
        let envelope: PlanEnvelope = self
            .send_json(self.client.post(self.url("/api/groq/studyplan")).json(request))
            .await?;
        Ok(envelope.plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_a_token_and_trims_the_url() {
        let err = ClientConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ClientError::MissingVar(ref key) if key == "STUDY_PLANNER_TOKEN"));

        let config = ClientConfig::from_lookup(|key| match key {
            "STUDY_PLANNER_URL" => Some("https://planner.example.com/".to_string()),
            "STUDY_PLANNER_TOKEN" => Some("abc".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.base_url, "https://planner.example.com");
    }

    #[test]
    fn error_bodies_keep_the_details() {
        let body = r#"{"error":"Failed to parse AI response","details":"AI response too long (12000 characters, limit 10000); it was most likely truncated by the provider"}"#;
        let message = error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(message.starts_with("Failed to parse AI response: "));
        assert!(message.contains("truncated"));

        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "502 Bad Gateway");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
    }

    #[test]
    fn api_statuses_map_to_port_errors() {
        let api = |status, message: &str| ClientError::Api {
            status,
            message: message.to_string(),
        };
        assert!(matches!(
            PortError::from(api(StatusCode::CONFLICT, "busy")),
            PortError::Conflict(_)
        ));
        assert!(matches!(
            PortError::from(api(StatusCode::NOT_FOUND, "gone")),
            PortError::NotFound(_)
        ));
        assert!(matches!(
            PortError::from(api(StatusCode::UNAUTHORIZED, "no")),
            PortError::Unauthorized
        ));
        let upstream = PortError::from(api(StatusCode::INTERNAL_SERVER_ERROR, "429 rate limit"));
        assert!(upstream.to_string().contains("rate limit"));
    }

    #[test]
    fn plan_envelope_reads_the_server_response() {
        let body = r#"{"success":true,"message":"Generated 1 sessions over 1 week(s)","plan":{"weeks":[{"weekNumber":1,"sessions":[{"subject":"Math","startTime":"2025-01-27T09:00:00Z","endTime":"2025-01-27T10:00:00Z","description":"Algebra","learningStyle":"visual"}]}]}}"#;
        let envelope: PlanEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.plan.session_count(), 1);
    }
}
