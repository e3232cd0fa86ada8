//! Firebase Auth over the Identity Toolkit REST API.
//!
//! Thin HTTP wrapper for `accounts:signUp`, `accounts:signInWithPassword`,
//! `accounts:signInWithIdp` and `accounts:update`. Response and error parsing
//! are pure functions for testability.

use std::time::Duration;

use super::{AuthIdentity, IdentityError, IdentityProvider, SignedInUser};
use crate::config::FirebaseConfig;

const GOOGLE_PROVIDER_ID: &str = "google.com";
/// `signInWithIdp` requires a request URI; the token is already verified
/// client-side so any registered origin works.
const IDP_REQUEST_URI: &str = "http://localhost";

// =============================================================================
// CLIENT
// =============================================================================

pub struct FirebaseIdentity {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FirebaseIdentity {
    /// Build a client from the Firebase web-app config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key: config.api_key.clone(), base_url: config.identity_url.clone() })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.base_url, self.api_key)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<AccountResponse, IdentityError> {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(%status, method, "identity toolkit rejected request");
            return Err(parse_error(&text));
        }

        parse_account(&text)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn create_user(&self, email: &str, password: &str) -> Result<SignedInUser, IdentityError> {
        let body = serde_json::json!({ "email": email, "password": password, "returnSecureToken": true });
        let account = self.call("signUp", body).await?;
        into_signed_in(account, None)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedInUser, IdentityError> {
        let body = serde_json::json!({ "email": email, "password": password, "returnSecureToken": true });
        let account = self.call("signInWithPassword", body).await?;
        into_signed_in(account, None)
    }

    async fn sign_in_with_google(&self, id_token: &str) -> Result<SignedInUser, IdentityError> {
        let post_body = format!("id_token={}&providerId={GOOGLE_PROVIDER_ID}", urlencoding::encode(id_token));
        let body = serde_json::json!({
            "postBody": post_body,
            "requestUri": IDP_REQUEST_URI,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        let account = self.call("signInWithIdp", body).await?;
        into_signed_in(account, None)
    }

    async fn update_display_name(
        &self,
        user: &SignedInUser,
        display_name: &str,
    ) -> Result<SignedInUser, IdentityError> {
        let body = serde_json::json!({
            "idToken": user.id_token,
            "displayName": display_name,
            "returnSecureToken": true,
        });
        let account = self.call("update", body).await?;
        into_signed_in(account, Some(user))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    /// `update` omits tokens unless they rotated.
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_account(json: &str) -> Result<AccountResponse, IdentityError> {
    serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))
}

fn into_signed_in(account: AccountResponse, previous: Option<&SignedInUser>) -> Result<SignedInUser, IdentityError> {
    let id_token = account
        .id_token
        .or_else(|| previous.map(|p| p.id_token.clone()))
        .ok_or_else(|| IdentityError::Parse("response missing idToken".into()))?;
    let refresh_token = account
        .refresh_token
        .or_else(|| previous.map(|p| p.refresh_token.clone()))
        .unwrap_or_default();

    let identity = AuthIdentity {
        uid: account.local_id,
        display_name: account.display_name.filter(|n| !n.is_empty()),
        email: account.email.filter(|e| !e.is_empty()),
    };
    Ok(SignedInUser { identity, id_token, refresh_token })
}

/// Translate an Identity Toolkit error body into an SDK-style error.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`.
fn parse_error(body: &str) -> IdentityError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return IdentityError::Parse(format!("unexpected error response: {body}"));
    };

    let (server_code, detail) = match envelope.error.message.split_once(" : ") {
        Some((code, detail)) => (code.trim().to_owned(), Some(detail.trim().to_owned())),
        None => (envelope.error.message.trim().to_owned(), None),
    };

    IdentityError::Rejected { code: auth_code(&server_code), detail }
}

/// Map a server error code to the client-facing `auth/*` code.
fn auth_code(server_code: &str) -> String {
    let mapped = match server_code {
        "EMAIL_EXISTS" => "email-already-in-use",
        "EMAIL_NOT_FOUND" => "user-not-found",
        "INVALID_PASSWORD" => "wrong-password",
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" => "invalid-credential",
        "INVALID_EMAIL" => "invalid-email",
        "MISSING_PASSWORD" => "missing-password",
        "WEAK_PASSWORD" => "weak-password",
        "USER_DISABLED" => "user-disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "too-many-requests",
        "OPERATION_NOT_ALLOWED" => "operation-not-allowed",
        "INVALID_ID_TOKEN" => "invalid-user-token",
        "TOKEN_EXPIRED" => "user-token-expired",
        other => return other.to_ascii_lowercase().replace('_', "-"),
    };
    mapped.to_owned()
}

#[cfg(test)]
#[path = "firebase_test.rs"]
mod tests;
