use super::*;
use crate::config::{DEFAULT_FIRESTORE_URL, DEFAULT_IDENTITY_URL, FirebaseConfig, HttpTimeouts};
use crate::identity::{AuthIdentity, IdentityProvider};
use crate::services::session::AuthState;
use crate::state::test_helpers::test_app;
use crate::store::{DocumentPath, DocumentStore};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use futures::StreamExt;

// =============================================================================
// helpers
// =============================================================================

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// The `session_token` Set-Cookie header, if the response sets one.
fn session_set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session_token="))
        .map(str::to_owned)
}

fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .trim_start_matches("session_token=")
        .split(';')
        .next()
        .unwrap_or_default()
        .to_owned()
}

fn jar_with(token: &str) -> CookieJar {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(&format!("session_token={token}")).unwrap());
    CookieJar::from_headers(&headers)
}

fn submit(mode: AuthMode, name: &str, email: &str, password: &str) -> LoginFormInput {
    LoginFormInput {
        intent: Some("submit".into()),
        mode,
        name: name.into(),
        email: email.into(),
        password: password.into(),
    }
}

fn toggle(mode: AuthMode, name: &str, email: &str) -> LoginFormInput {
    LoginFormInput {
        intent: Some("toggle".into()),
        mode,
        name: name.into(),
        email: email.into(),
        password: String::new(),
    }
}

fn firebase_config() -> FirebaseConfig {
    FirebaseConfig {
        api_key: "AIzaTest".into(),
        auth_domain: "farm.firebaseapp.com".into(),
        project_id: "farm".into(),
        storage_bucket: String::new(),
        messaging_sender_id: String::new(),
        app_id: "1:42:web:abc".into(),
        identity_url: DEFAULT_IDENTITY_URL.into(),
        firestore_url: DEFAULT_FIRESTORE_URL.into(),
        timeouts: HttpTimeouts::default(),
    }
}

fn signed_in_user(uid: &str, email: &str) -> SignedInUser {
    SignedInUser {
        identity: AuthIdentity { uid: uid.into(), display_name: None, email: Some(email.into()) },
        id_token: "id".into(),
        refresh_token: "refresh".into(),
    }
}

// =============================================================================
// login page
// =============================================================================

#[tokio::test]
async fn login_page_defaults_to_login_mode() {
    let app = test_app();
    let response = login_page(State(app.state), Query(LoginQuery::default())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains(r#"name="mode" value="login""#));
    assert!(!body.contains(r#"type="text" name="name""#));
    assert!(!body.contains(r#"role="alert""#));
}

#[tokio::test]
async fn login_page_without_firebase_hides_google_sign_in() {
    let app = test_app();
    let response = login_page(State(app.state), Query(LoginQuery::default())).await;
    let body = body_text(response).await;
    assert!(!body.contains("google-form"));
    assert!(!body.contains("firebase-config"));
}

#[tokio::test]
async fn login_page_with_firebase_wires_google_popup_to_form() {
    let mut app = test_app();
    app.state.firebase = Some(firebase_config());
    let response = login_page(State(app.state), Query(LoginQuery::default())).await;
    let body = body_text(response).await;

    assert!(body.contains(r#"id="firebase-config">{"apiKey":"AIzaTest""#));
    assert!(body.contains("firebase-auth-compat.js"));
    assert!(body.contains(r#"JSON.parse(document.getElementById("firebase-config").textContent)"#));
    assert!(body.contains("signInWithPopup(new firebase.auth.GoogleAuthProvider())"));
    assert!(body.contains(r#"<form method="post" action="/auth/google" id="google-form""#));
    assert!(body.contains(r#"<button type="button" id="google-button">"#));
    assert!(body.contains("if (!idToken)"));
}

#[tokio::test]
async fn login_page_signup_query_shows_name_field() {
    let app = test_app();
    let response = login_page(State(app.state), Query(LoginQuery { mode: AuthMode::Signup })).await;
    let body = body_text(response).await;
    assert!(body.contains(r#"name="mode" value="signup""#));
    assert!(body.contains(r#"name="name""#));
}

#[tokio::test]
async fn toggle_flips_mode_and_keeps_typed_fields() {
    let app = test_app();
    let input = LoginFormInput {
        intent: Some("toggle".into()),
        mode: AuthMode::Login,
        name: String::new(),
        email: "bob@x.com".into(),
        password: "hunter22".into(),
    };

    let response = login_submit(State(app.state.clone()), CookieJar::new(), Form(input)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_set_cookie(&response).is_none());
    let body = body_text(response).await;
    assert!(body.contains(r#"name="mode" value="signup""#));
    assert!(body.contains(r#"value="bob@x.com""#));
    assert!(body.contains(r#"value="hunter22""#));
    assert!(app.state.sessions.is_empty());
    assert_eq!(app.identity.account_count(), 0);
}

#[tokio::test]
async fn name_survives_toggling_through_login_mode() {
    let app = test_app();
    let response = login_submit(
        State(app.state.clone()),
        CookieJar::new(),
        Form(toggle(AuthMode::Signup, "Ann", "ann@x.com")),
    )
    .await;
    let body = body_text(response).await;
    assert!(body.contains(r#"name="mode" value="login""#));
    assert!(body.contains(r#"<input type="hidden" name="name" value="Ann">"#));

    let response = login_submit(
        State(app.state),
        CookieJar::new(),
        Form(toggle(AuthMode::Login, "Ann", "ann@x.com")),
    )
    .await;
    let body = body_text(response).await;
    assert!(body.contains(r#"name="mode" value="signup""#));
    assert!(body.contains(r#"<input type="text" name="name" value="Ann""#));
}

// =============================================================================
// credential submit
// =============================================================================

#[tokio::test]
async fn signup_sets_session_cookie_and_redirects_to_dashboard() {
    let app = test_app();
    let response = login_submit(
        State(app.state.clone()),
        CookieJar::new(),
        Form(submit(AuthMode::Signup, "Alice", "alice@x.com", "hunter22")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard?name=Alice"));
    let set_cookie = session_set_cookie(&response).expect("session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains(&format!("Max-Age={}", SESSION_TTL.whole_seconds())));

    let token = cookie_value(&set_cookie);
    match app.state.sessions.current(Some(&token)) {
        AuthState::SignedIn(identity) => assert_eq!(identity.display_name.as_deref(), Some("Alice")),
        other => panic!("expected signed in, got {other:?}"),
    }

    let path = DocumentPath::new("users", "Alice").unwrap();
    let doc = app.store.get(&path, None).await.unwrap().expect("profile written");
    assert_eq!(doc["email"], "alice@x.com");
    assert_eq!(doc["provider"], "password");
}

#[tokio::test]
async fn login_with_existing_account_redirects_with_email_username() {
    let app = test_app();
    app.identity.create_user("bob@x.com", "hunter22").await.unwrap();

    let response = login_submit(
        State(app.state.clone()),
        CookieJar::new(),
        Form(submit(AuthMode::Login, "", "bob@x.com", "hunter22")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard?name=bob"));
    assert_eq!(app.store.count("users").await, 1);
}

#[tokio::test]
async fn rejected_login_rerenders_form_with_alert() {
    let app = test_app();
    let response = login_submit(
        State(app.state.clone()),
        CookieJar::new(),
        Form(submit(AuthMode::Login, "", "nobody@x.com", "hunter22")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(location(&response).is_none());
    assert!(session_set_cookie(&response).is_none());
    let body = body_text(response).await;
    assert!(body.contains(r#"role="alert""#));
    assert!(body.contains("invalid-credential"));
    assert!(body.contains(r#"value="nobody@x.com""#));
    assert!(app.state.sessions.is_empty());
    assert_eq!(app.store.count("users").await, 0);
}

#[tokio::test]
async fn weak_password_signup_alerts_with_provider_message() {
    let app = test_app();
    let response = login_submit(
        State(app.state),
        CookieJar::new(),
        Form(submit(AuthMode::Signup, "Alice", "alice@x.com", "abc")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_text(response).await;
    assert!(body.contains("Password should be at least 6 characters"));
    assert!(body.contains(r#"name="mode" value="signup""#));
}

#[tokio::test]
async fn failed_resubmit_keeps_existing_session_signed_in() {
    let app = test_app();
    let token = app.state.sessions.begin_sign_in(None);
    app.state
        .sessions
        .complete_sign_in(&token, signed_in_user("uid-1", "bob@x.com"));

    let response = login_submit(
        State(app.state.clone()),
        jar_with(&token),
        Form(submit(AuthMode::Login, "", "bob@x.com", "wrong-password")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(matches!(app.state.sessions.current(Some(&token)), AuthState::SignedIn(_)));
}

// =============================================================================
// google
// =============================================================================

#[tokio::test]
async fn google_sign_in_with_registered_token_redirects() {
    let app = test_app();
    app.identity
        .register_google_token("google-token", "carol@x.com", Some("Carol"));

    let response = google_sign_in(
        State(app.state.clone()),
        CookieJar::new(),
        Form(GoogleInput { credential: "google-token".into() }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard?name=Carol"));
    assert!(session_set_cookie(&response).is_some());

    let path = DocumentPath::new("users", "Carol").unwrap();
    let doc = app.store.get(&path, None).await.unwrap().expect("profile written");
    assert_eq!(doc["provider"], "password");
}

#[tokio::test]
async fn google_sign_in_with_unknown_token_alerts() {
    let app = test_app();
    let response = google_sign_in(
        State(app.state.clone()),
        CookieJar::new(),
        Form(GoogleInput { credential: "forged".into() }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_set_cookie(&response).is_none());
    let body = body_text(response).await;
    assert!(body.contains(r#"role="alert""#));
    assert_eq!(app.identity.account_count(), 0);
}

// =============================================================================
// logout / me
// =============================================================================

#[tokio::test]
async fn logout_signs_out_and_clears_cookie() {
    let app = test_app();
    let token = app.state.sessions.begin_sign_in(None);
    app.state
        .sessions
        .complete_sign_in(&token, signed_in_user("uid-1", "bob@x.com"));

    let response = logout(State(app.state.clone()), jar_with(&token)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));
    let set_cookie = session_set_cookie(&response).expect("clearing cookie");
    assert!(set_cookie.contains("Max-Age=0"));
    assert_eq!(app.state.sessions.current(Some(&token)), AuthState::SignedOut);
    assert!(app.state.sessions.is_empty());
}

#[tokio::test]
async fn logout_without_session_still_redirects() {
    let app = test_app();
    let response = logout(State(app.state), CookieJar::new()).await;
    assert_eq!(location(&response), Some("/auth/login"));
}

async fn extract_session_user(state: &AppState, cookie: Option<&str>) -> Result<SessionUser, StatusCode> {
    let mut request = Request::builder().uri("/api/auth/me");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, format!("session_token={cookie}"));
    }
    let (mut parts, ()) = request.body(()).unwrap().into_parts();
    SessionUser::from_request_parts(&mut parts, state).await
}

#[tokio::test]
async fn session_user_requires_signed_in_session() {
    let app = test_app();
    assert_eq!(extract_session_user(&app.state, None).await.err(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(
        extract_session_user(&app.state, Some("unknown")).await.err(),
        Some(StatusCode::UNAUTHORIZED)
    );

    let loading = app.state.sessions.begin_sign_in(None);
    assert_eq!(
        extract_session_user(&app.state, Some(&loading)).await.err(),
        Some(StatusCode::UNAUTHORIZED)
    );
}

#[tokio::test]
async fn me_returns_signed_in_identity() {
    let app = test_app();
    let token = app.state.sessions.begin_sign_in(None);
    app.state
        .sessions
        .complete_sign_in(&token, signed_in_user("uid-7", "dave@x.com"));

    let user = extract_session_user(&app.state, Some(&token))
        .await
        .unwrap_or_else(|status| panic!("expected session user, got {status}"));
    assert_eq!(user.token, token);

    let Json(identity) = me(user).await;
    assert_eq!(identity.uid, "uid-7");
    assert_eq!(identity.email.as_deref(), Some("dave@x.com"));
}

#[tokio::test]
async fn profile_returns_document_written_at_sign_in() {
    let app = test_app();
    let response = login_submit(
        State(app.state.clone()),
        CookieJar::new(),
        Form(submit(AuthMode::Signup, "Alice", "alice@x.com", "hunter22")),
    )
    .await;
    let token = cookie_value(&session_set_cookie(&response).expect("session cookie"));

    let user = extract_session_user(&app.state, Some(&token))
        .await
        .unwrap_or_else(|status| panic!("expected session user, got {status}"));
    let Json(doc) = profile(State(app.state.clone()), user)
        .await
        .unwrap_or_else(|status| panic!("expected profile, got {status}"));
    assert_eq!(doc["displayName"], "Alice");
    assert_eq!(doc["email"], "alice@x.com");
}

#[tokio::test]
async fn profile_without_document_is_not_found() {
    let app = test_app();
    let token = app.state.sessions.begin_sign_in(None);
    app.state
        .sessions
        .complete_sign_in(&token, signed_in_user("uid-9", "erin@x.com"));

    let user = extract_session_user(&app.state, Some(&token))
        .await
        .unwrap_or_else(|status| panic!("expected session user, got {status}"));
    let status = profile(State(app.state), user).await.err();
    assert_eq!(status, Some(StatusCode::NOT_FOUND));
}

// =============================================================================
// auth state stream
// =============================================================================

#[tokio::test]
async fn auth_events_for_unknown_session_emit_once_then_end() {
    let app = test_app();
    let events: Vec<_> = auth_events(app.state.sessions.subscribe(None)).collect().await;
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn auth_events_follow_session_until_sign_out() {
    let app = test_app();
    let token = app.state.sessions.begin_sign_in(None);
    let mut events = Box::pin(auth_events(app.state.sessions.subscribe(Some(&token))));

    assert!(events.next().await.is_some());
    app.state
        .sessions
        .complete_sign_in(&token, signed_in_user("uid-1", "bob@x.com"));
    assert!(events.next().await.is_some());

    app.state.sessions.sign_out(&token);
    assert!(events.next().await.is_some());
    assert!(events.next().await.is_none());
}
