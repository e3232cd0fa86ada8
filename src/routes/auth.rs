//! Auth routes: login/signup form, Google sign-in, session state.

use std::convert::Infallible;

use axum::extract::{FromRef, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use futures::Stream;
use serde::Deserialize;
use time::Duration;

use super::views::{LoginTemplate, render};
use crate::flow::dispatch::{AuthDispatcher, NavigateOptions, Navigator, Notifier, SubmitOutcome};
use crate::flow::form::{AuthMode, CredentialForm};
use crate::flow::gate::LOGIN_PATH;
use crate::identity::SignedInUser;
use crate::services::profile::load_profile;
use crate::services::session::{AuthSubscription, SESSION_TTL};
use crate::state::AppState;
use crate::store::Document;

pub(crate) const COOKIE_NAME: &str = "session_token";

pub(crate) fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(SESSION_TTL)
        .build()
}

fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

/// Session token from the cookie, if present and non-empty.
pub(crate) fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Signed-in user resolved from the session cookie.
/// Use as a handler parameter to require a signed-in session.
pub struct SessionUser {
    pub user: SignedInUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for SessionUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar).ok_or(StatusCode::UNAUTHORIZED)?;
        let app_state = AppState::from_ref(state);
        let user = app_state
            .sessions
            .user(Some(&token))
            .ok_or(StatusCode::UNAUTHORIZED)?;
        Ok(Self { user, token })
    }
}

// =============================================================================
// PAGE HOST
// =============================================================================

/// Collects the dispatcher's navigation and alerts for the HTTP response.
#[derive(Debug, Default)]
pub(crate) struct PageEffects {
    pub redirect: Option<(String, NavigateOptions)>,
    pub alerts: Vec<String>,
}

impl Navigator for PageEffects {
    fn navigate(&mut self, to: &str, options: NavigateOptions) {
        self.redirect = Some((to.to_owned(), options));
    }
}

impl Notifier for PageEffects {
    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_owned());
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    mode: AuthMode,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginFormInput {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    mode: AuthMode,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl LoginFormInput {
    fn is_toggle(&self) -> bool {
        self.intent.as_deref() == Some("toggle")
    }

    fn into_form(self) -> CredentialForm {
        CredentialForm { mode: self.mode, name: self.name, email: self.email, password: self.password, submitting: false }
    }
}

#[derive(Debug, Deserialize)]
pub struct GoogleInput {
    #[serde(default)]
    credential: String,
}

fn login_view(state: &AppState, form: &CredentialForm, alerts: &[String], status: StatusCode) -> Response {
    let firebase_config = state.firebase.as_ref().map(|c| c.web_config_json().to_string());
    render(&LoginTemplate::new(form, alerts, firebase_config), status)
}

/// Turn a finished attempt into a response: set the session cookie when the
/// attempt signed in, then follow the navigation or re-render the form with
/// its alerts.
fn attempt_response(state: &AppState, jar: CookieJar, form: &CredentialForm, outcome: &SubmitOutcome, effects: PageEffects) -> Response {
    let jar = match outcome.session_token() {
        Some(token) => jar.add(session_cookie(token.to_owned(), state.cookie_secure)),
        None => jar,
    };

    if let Some((to, _)) = effects.redirect {
        return (jar, Redirect::to(&to)).into_response();
    }

    let status = match outcome {
        SubmitOutcome::Rejected => StatusCode::UNAUTHORIZED,
        SubmitOutcome::ProfileFailed { .. } => StatusCode::BAD_GATEWAY,
        SubmitOutcome::Completed { .. } | SubmitOutcome::Ignored => StatusCode::OK,
    };
    (jar, login_view(state, form, &effects.alerts, status)).into_response()
}

/// `GET /auth/login`: render the form; `?mode=signup` opens in signup mode.
pub async fn login_page(State(state): State<AppState>, Query(query): Query<LoginQuery>) -> Response {
    login_view(&state, &CredentialForm::new(query.mode), &[], StatusCode::OK)
}

/// `POST /auth/login`: toggle the mode or submit the credentials.
pub async fn login_submit(State(state): State<AppState>, jar: CookieJar, Form(input): Form<LoginFormInput>) -> Response {
    let toggle = input.is_toggle();
    let mut form = input.into_form();
    if toggle {
        form.toggle_mode();
        return login_view(&state, &form, &[], StatusCode::OK);
    }

    let existing = session_token(&jar);
    let mut effects = PageEffects::default();
    let dispatcher = AuthDispatcher::new(state.identity.as_ref(), state.store.as_ref(), &state.sessions);
    let outcome = dispatcher
        .on_submit(&mut form, existing.as_deref(), &mut effects)
        .await;
    tracing::info!(mode = form.mode.as_str(), signed_in = outcome.session_token().is_some(), "credential submit handled");

    attempt_response(&state, jar, &form, &outcome, effects)
}

/// `POST /auth/google`: sign in with a Google ID token from the browser.
pub async fn google_sign_in(State(state): State<AppState>, jar: CookieJar, Form(input): Form<GoogleInput>) -> Response {
    let existing = session_token(&jar);
    let mut form = CredentialForm::new(AuthMode::Login);
    let mut effects = PageEffects::default();
    let dispatcher = AuthDispatcher::new(state.identity.as_ref(), state.store.as_ref(), &state.sessions);
    let outcome = dispatcher
        .on_google_click(&mut form, &input.credential, existing.as_deref(), &mut effects)
        .await;
    tracing::info!(signed_in = outcome.session_token().is_some(), "google sign-in handled");

    attempt_response(&state, jar, &form, &outcome, effects)
}

/// `POST /auth/logout`: sign the session out, clear the cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar) {
        state.sessions.sign_out(&token);
    }
    let jar = jar.add(clear_session_cookie(state.cookie_secure));
    (jar, Redirect::to(LOGIN_PATH)).into_response()
}

/// `GET /api/auth/me`: the signed-in identity.
pub async fn me(auth: SessionUser) -> Json<crate::identity::AuthIdentity> {
    Json(auth.user.identity)
}

/// `GET /api/profile`: the signed-in user's stored profile document.
pub async fn profile(State(state): State<AppState>, auth: SessionUser) -> Result<Json<Document>, StatusCode> {
    let identity = &auth.user.identity;
    match load_profile(state.store.as_ref(), identity, Some(&auth.user.id_token)).await {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::warn!(uid = %identity.uid, error = %e, "profile read failed");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// `GET /api/auth/state`: the session's auth state, then every change.
///
/// The stream ends once the session is gone.
pub async fn auth_state_stream(State(state): State<AppState>, jar: CookieJar) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.sessions.subscribe(session_token(&jar).as_deref());
    Sse::new(auth_events(subscription)).keep_alive(KeepAlive::default())
}

pub(crate) fn auth_events(subscription: AuthSubscription) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold((subscription, true), |(mut subscription, first)| async move {
        if !first && !subscription.changed().await {
            return None;
        }
        let event = Event::default()
            .event("auth")
            .json_data(subscription.current())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "auth state serialization failed");
                Event::default().event("auth")
            });
        Some((Ok(event), (subscription, false)))
    })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
