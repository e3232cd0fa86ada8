//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Server-rendered login and dashboard pages plus a small JSON/SSE surface
//! for the session's auth state, all under a single Axum router.

pub mod auth;
pub mod dashboard;
pub mod views;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::flow::gate::LOGIN_PATH;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(redirect_root))
        .route(LOGIN_PATH, get(auth::login_page).post(auth::login_submit))
        .route("/auth/google", post(auth::google_sign_in))
        .route("/auth/logout", post(auth::logout))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/state", get(auth::auth_state_stream))
        .route("/api/profile", get(auth::profile))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn redirect_root() -> Redirect {
    Redirect::temporary(LOGIN_PATH)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
