//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_planner_core::ports::PortError;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::bearer_token;
use crate::web::rest::{
    bad_request, error_response, invalid_body, port_error, ErrorBody, HandlerError,
};
use crate::web::state::AppState;

const MIN_PASSWORD_CHARS: usize = 6;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates an auth session for the user and builds the response carrying its token.
async fn issue_token(
    state: &AppState,
    user_id: Uuid,
    email: String,
) -> Result<AuthResponse, HandlerError> {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(state.config.auth_session_days);

    state
        .db
        .create_auth_session(&token, user_id, expires_at)
        .await
        .map_err(|e| port_error("Failed to create session", e))?;

    Ok(AuthResponse {
        token,
        user_id,
        email,
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;

    // 1. Validate the input
    let email = normalize_email(&req.email);
    if email.is_empty() || !email.contains('@') {
        return Err(bad_request("A valid email address is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(bad_request("Password must be at least 6 characters"));
    }

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password", None)
        })?
        .to_string();

    // 3. Create user in database
    let user = state
        .db
        .create_user_with_email(&email, &password_hash)
        .await
        .map_err(|e| port_error("Failed to create user", e))?;
    info!(user_id = %user.user_id, "User signed up");

    // 4. Issue a token
    let response = issue_token(&state, user.user_id, user.email).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(req) = payload.map_err(invalid_body)?;
    let invalid = || error_response(StatusCode::UNAUTHORIZED, "Invalid email or password", None);

    // 1. Get user by email
    let user_creds = match state.db.get_user_by_email(&normalize_email(&req.email)).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(port_error("Failed to look up user", e)),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error", None)
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(invalid());
    }

    // 3. Issue a token
    let response = issue_token(&state, user_creds.user_id, user_creds.email).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/auth/logout - Invalidate the bearer token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "No token supplied", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "No session found", None))?;

    state
        .db
        .delete_auth_session(token)
        .await
        .map_err(|e| port_error("Failed to logout", e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{read_json, test_app, TestApp};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn signup_then_login_issue_working_tokens() {
        let TestApp { router, .. } = test_app();

        let res = router
            .clone()
            .oneshot(json_request(
                "/api/auth/signup",
                serde_json::json!({"email": "Ada@Example.com", "password": "secret-pass"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let signup: AuthResponse = read_json(res).await;
        assert_eq!(signup.email, "ada@example.com");

        let res = router
            .clone()
            .oneshot(json_request(
                "/api/auth/login",
                serde_json::json!({"email": "ada@example.com", "password": "secret-pass"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let login: AuthResponse = read_json(res).await;
        assert_eq!(login.user_id, signup.user_id);
        assert_ne!(login.token, signup.token);

        let res = router
            .oneshot(
                Request::builder()
                    .uri("/api/study-sessions")
                    .header("authorization", format!("Bearer {}", login.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts_and_bad_password_is_rejected() {
        let TestApp { router, .. } = test_app();
        let body = serde_json::json!({"email": "sam@example.com", "password": "hunter22"});

        let first = router
            .clone()
            .oneshot(json_request("/api/auth/signup", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = router.clone().oneshot(json_request("/api/auth/signup", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let res = router
            .oneshot(json_request(
                "/api/auth/login",
                serde_json::json!({"email": "sam@example.com", "password": "wrong-one"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let TestApp { router, .. } = test_app();
        let res = router
            .clone()
            .oneshot(json_request(
                "/api/auth/signup",
                serde_json::json!({"email": "not-an-email", "password": "long-enough"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = router
            .oneshot(json_request("/api/auth/signup", serde_json::json!({"email": "a@b.c"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = test_app();
        let token = app.token_for_new_user().await;

        let res = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/study-sessions")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
