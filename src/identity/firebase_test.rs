use super::*;
use crate::config::{DEFAULT_FIRESTORE_URL, HttpTimeouts};

fn test_config() -> FirebaseConfig {
    FirebaseConfig {
        api_key: "AIzaTest".into(),
        auth_domain: "farm.firebaseapp.com".into(),
        project_id: "farm".into(),
        storage_bucket: String::new(),
        messaging_sender_id: String::new(),
        app_id: String::new(),
        identity_url: "http://localhost:9099/identitytoolkit.googleapis.com/v1".into(),
        firestore_url: DEFAULT_FIRESTORE_URL.into(),
        timeouts: HttpTimeouts::default(),
    }
}

// =============================================================================
// endpoint
// =============================================================================

#[test]
fn endpoint_appends_method_and_key() {
    let client = FirebaseIdentity::new(&test_config()).unwrap();
    assert_eq!(
        client.endpoint("signInWithPassword"),
        "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=AIzaTest"
    );
}

// =============================================================================
// parse_account / into_signed_in
// =============================================================================

#[test]
fn sign_in_response_maps_identity_and_tokens() {
    let json = serde_json::json!({
        "kind": "identitytoolkit#VerifyPasswordResponse",
        "localId": "uid-1",
        "email": "bob@x.com",
        "displayName": "",
        "idToken": "id-tok",
        "registered": true,
        "refreshToken": "refresh-tok",
        "expiresIn": "3600"
    })
    .to_string();
    let user = into_signed_in(parse_account(&json).unwrap(), None).unwrap();
    assert_eq!(user.identity.uid, "uid-1");
    assert_eq!(user.identity.email.as_deref(), Some("bob@x.com"));
    assert_eq!(user.identity.display_name, None, "empty display name is treated as absent");
    assert_eq!(user.id_token, "id-tok");
    assert_eq!(user.refresh_token, "refresh-tok");
}

#[test]
fn update_response_without_tokens_keeps_previous_tokens() {
    let previous = SignedInUser {
        identity: AuthIdentity { uid: "uid-2".into(), display_name: None, email: Some("a@x.com".into()) },
        id_token: "old-id".into(),
        refresh_token: "old-refresh".into(),
    };
    let json = r#"{"localId":"uid-2","email":"a@x.com","displayName":"Alice"}"#;
    let user = into_signed_in(parse_account(json).unwrap(), Some(&previous)).unwrap();
    assert_eq!(user.identity.display_name.as_deref(), Some("Alice"));
    assert_eq!(user.id_token, "old-id");
    assert_eq!(user.refresh_token, "old-refresh");
}

#[test]
fn missing_id_token_without_previous_is_parse_error() {
    let json = r#"{"localId":"uid-3"}"#;
    let err = into_signed_in(parse_account(json).unwrap(), None).unwrap_err();
    assert!(matches!(err, IdentityError::Parse(_)));
}

#[test]
fn malformed_account_is_parse_error() {
    assert!(matches!(parse_account("not json"), Err(IdentityError::Parse(_))));
}

// =============================================================================
// parse_error
// =============================================================================

fn error_body(message: &str) -> String {
    serde_json::json!({
        "error": { "code": 400, "message": message, "errors": [{ "message": message, "domain": "global", "reason": "invalid" }] }
    })
    .to_string()
}

#[test]
fn email_exists_maps_to_sdk_message() {
    let err = parse_error(&error_body("EMAIL_EXISTS"));
    assert_eq!(err.code(), Some("email-already-in-use"));
    assert_eq!(err.to_string(), "Firebase: Error (auth/email-already-in-use).");
}

#[test]
fn weak_password_detail_is_kept() {
    let err = parse_error(&error_body("WEAK_PASSWORD : Password should be at least 6 characters"));
    assert_eq!(err.code(), Some("weak-password"));
    assert_eq!(err.to_string(), "Firebase: Password should be at least 6 characters (auth/weak-password).");
}

#[test]
fn invalid_login_credentials_maps_to_invalid_credential() {
    let err = parse_error(&error_body("INVALID_LOGIN_CREDENTIALS"));
    assert_eq!(err.code(), Some("invalid-credential"));
}

#[test]
fn unknown_code_is_kebab_cased() {
    let err = parse_error(&error_body("PROJECT_NOT_FOUND"));
    assert_eq!(err.code(), Some("project-not-found"));
}

#[test]
fn non_json_error_body_is_parse_error() {
    let err = parse_error("<html>502 Bad Gateway</html>");
    assert!(matches!(err, IdentityError::Parse(_)));
    assert_eq!(err.code(), None);
}
