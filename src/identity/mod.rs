//! Identity providers: email/password and Google sign-in.
//!
//! DESIGN
//! ======
//! The login flow talks to an `IdentityProvider` trait object so handlers
//! never know whether accounts live in Firebase Auth or in process memory.
//! `FirebaseIdentity` wraps the Identity Toolkit REST API; `MemoryIdentity`
//! backs local development and tests.

pub mod firebase;
pub mod memory;

use serde::{Deserialize, Serialize};

pub use firebase::FirebaseIdentity;
pub use memory::MemoryIdentity;

// =============================================================================
// TYPES
// =============================================================================

/// Identity fields the profile upsert needs from a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// A user returned by a successful sign-in, with provider tokens.
#[derive(Debug, Clone)]
pub struct SignedInUser {
    pub identity: AuthIdentity,
    /// Bearer token accepted by the document store.
    pub id_token: String,
    pub refresh_token: String,
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity provider calls.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider rejected the request with an `auth/*` code.
    #[error("Firebase: {} (auth/{}).", detail.as_deref().unwrap_or("Error"), code)]
    Rejected { code: String, detail: Option<String> },

    /// The HTTP request to the provider failed.
    #[error("Firebase: Error (auth/network-request-failed).")]
    Network(String),

    /// The provider response body could not be parsed.
    #[error("Firebase: Error (auth/internal-error).")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl IdentityError {
    #[must_use]
    pub fn rejected(code: &str) -> Self {
        Self::Rejected { code: code.to_owned(), detail: None }
    }

    /// The `auth/*` code, when the provider supplied one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// External identity provider used by the login flow.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account with email and password, returning the new user.
    async fn create_user(&self, email: &str, password: &str) -> Result<SignedInUser, IdentityError>;

    /// Sign in an existing account with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedInUser, IdentityError>;

    /// Sign in with a Google ID token obtained by the browser popup.
    async fn sign_in_with_google(&self, id_token: &str) -> Result<SignedInUser, IdentityError>;

    /// Set the display name on a signed-in user and return the updated user.
    async fn update_display_name(&self, user: &SignedInUser, display_name: &str)
    -> Result<SignedInUser, IdentityError>;
}
