//! HTML views rendered with askama.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::flow::form::CredentialForm;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub mode: &'a str,
    pub signup: bool,
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub alerts: &'a [String],
    /// Serialized public Firebase web config, when configured.
    pub firebase_config: Option<String>,
}

impl<'a> LoginTemplate<'a> {
    #[must_use]
    pub fn new(form: &'a CredentialForm, alerts: &'a [String], firebase_config: Option<String>) -> Self {
        Self {
            mode: form.mode.as_str(),
            signup: form.is_signup(),
            name: &form.name,
            email: &form.email,
            password: &form.password,
            alerts,
            firebase_config,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate<'a> {
    pub name: &'a str,
    pub loading: bool,
}

/// Render a template into an HTML response, or a bare 500 if rendering fails.
pub fn render<T: Template>(template: &T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
