//! Dashboard route behind the auth gate.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::auth::session_token;
use super::views::{DashboardTemplate, render};
use crate::flow::gate::{DashboardGate, GateView};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    name: Option<String>,
}

/// `GET /dashboard`: waits out an in-flight sign-in, then welcomes the user
/// or redirects to the login page.
pub async fn dashboard(State(state): State<AppState>, jar: CookieJar, Query(query): Query<DashboardQuery>) -> Response {
    let token = session_token(&jar);
    let mut gate = DashboardGate::mount(&state.sessions, token.as_deref(), query.name);
    gate.settle().await;

    match gate.view() {
        GateView::Welcome { name } => render(&DashboardTemplate { name: &name, loading: false }, StatusCode::OK),
        GateView::Spinner => render(&DashboardTemplate { name: "", loading: true }, StatusCode::OK),
        GateView::Redirect { to, .. } => Redirect::to(to).into_response(),
    }
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
