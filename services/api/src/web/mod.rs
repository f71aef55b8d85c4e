pub mod auth;
pub mod groq;
pub mod middleware;
pub mod notes;
pub mod rest;
pub mod sessions;
pub mod state;
pub mod study_plan;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
use state::AppState;

/// Builds every `/api` route. Everything but signup, login and logout sits
/// behind [`require_auth`].
pub fn api_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/auth/signup", post(auth::signup_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/api/study-sessions",
            get(sessions::list_sessions_handler).post(sessions::create_session_handler),
        )
        .route(
            "/api/study-sessions/{id}",
            get(sessions::get_session_handler)
                .put(sessions::update_session_handler)
                .delete(sessions::delete_session_handler),
        )
        .route(
            "/api/study-plan",
            get(study_plan::get_plan_handler).put(study_plan::update_plan_handler),
        )
        .route("/api/groq/studyplan", post(groq::generate_plan_handler))
        .route("/api/groq/summary", post(groq::summary_handler))
        .route("/api/groq/quiz", post(groq::quiz_handler))
        .route(
            "/api/notes",
            get(notes::list_notes_handler).post(notes::upload_note_handler),
        )
        .route("/api/notes/{id}", delete(notes::delete_note_handler))
        .route("/api/subjects", get(notes::list_subjects_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
