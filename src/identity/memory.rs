//! In-process identity provider for local development and tests.
//!
//! Accounts are keyed by normalized email. Passwords are stored as SHA-256
//! hex digests. Google ID tokens must be registered up-front with
//! [`MemoryIdentity::register_google_token`]; an unknown token is rejected the
//! way Firebase rejects an invalid IdP response.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::{AuthIdentity, IdentityError, IdentityProvider, SignedInUser};
use crate::services::session::{bytes_to_hex, generate_token};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    display_name: Option<String>,
    /// `None` for accounts created through Google sign-in only.
    password_hash: Option<String>,
}

#[derive(Debug, Clone)]
struct GoogleProfile {
    email: String,
    display_name: Option<String>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    google_tokens: HashMap<String, GoogleProfile>,
    /// Issued ID token -> account email. Only the latest token per account
    /// is kept.
    sessions: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryIdentity {
    inner: Mutex<Inner>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id_token` acceptable to [`IdentityProvider::sign_in_with_google`].
    pub fn register_google_token(&self, id_token: &str, email: &str, display_name: Option<&str>) {
        let mut inner = self.lock();
        inner.google_tokens.insert(
            id_token.to_owned(),
            GoogleProfile { email: email.trim().to_ascii_lowercase(), display_name: display_name.map(str::to_owned) },
        );
    }

    /// Number of live ID tokens.
    #[cfg(test)]
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Number of registered accounts.
    #[cfg(test)]
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn create_user(&self, email: &str, password: &str) -> Result<SignedInUser, IdentityError> {
        let email = normalize_email(email).ok_or_else(|| IdentityError::rejected("invalid-email"))?;
        check_password(password)?;

        let mut inner = self.lock();
        if inner.accounts.contains_key(&email) {
            return Err(IdentityError::rejected("email-already-in-use"));
        }
        let account = Account {
            uid: generate_uid(),
            email: email.clone(),
            display_name: None,
            password_hash: Some(hash_password(password)),
        };
        inner.accounts.insert(email, account.clone());
        Ok(issue(&mut inner, &account))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedInUser, IdentityError> {
        let email = normalize_email(email).ok_or_else(|| IdentityError::rejected("invalid-email"))?;
        if password.is_empty() {
            return Err(IdentityError::rejected("missing-password"));
        }

        let mut inner = self.lock();
        let account = inner
            .accounts
            .get(&email)
            .filter(|a| a.password_hash.as_deref() == Some(hash_password(password).as_str()))
            .cloned()
            .ok_or_else(|| IdentityError::rejected("invalid-credential"))?;
        Ok(issue(&mut inner, &account))
    }

    async fn sign_in_with_google(&self, id_token: &str) -> Result<SignedInUser, IdentityError> {
        let mut inner = self.lock();
        let profile = inner
            .google_tokens
            .get(id_token)
            .cloned()
            .ok_or_else(|| IdentityError::rejected("invalid-credential"))?;

        let account = inner
            .accounts
            .entry(profile.email.clone())
            .or_insert_with(|| Account {
                uid: generate_uid(),
                email: profile.email.clone(),
                display_name: profile.display_name.clone(),
                password_hash: None,
            })
            .clone();
        Ok(issue(&mut inner, &account))
    }

    async fn update_display_name(
        &self,
        user: &SignedInUser,
        display_name: &str,
    ) -> Result<SignedInUser, IdentityError> {
        let mut inner = self.lock();
        let email = inner
            .sessions
            .get(&user.id_token)
            .cloned()
            .ok_or_else(|| IdentityError::rejected("invalid-user-token"))?;
        let account = inner
            .accounts
            .get_mut(&email)
            .ok_or_else(|| IdentityError::rejected("user-not-found"))?;
        account.display_name = Some(display_name.to_owned()).filter(|n| !n.is_empty());

        let mut updated = user.clone();
        updated.identity.display_name = account.display_name.clone();
        Ok(updated)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn issue(inner: &mut Inner, account: &Account) -> SignedInUser {
    let id_token = generate_token();
    inner.sessions.retain(|_, email| *email != account.email);
    inner
        .sessions
        .insert(id_token.clone(), account.email.clone());
    SignedInUser {
        identity: AuthIdentity {
            uid: account.uid.clone(),
            display_name: account.display_name.clone(),
            email: Some(account.email.clone()),
        },
        id_token,
        refresh_token: generate_token(),
    }
}

fn check_password(password: &str) -> Result<(), IdentityError> {
    if password.is_empty() {
        return Err(IdentityError::rejected("missing-password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(IdentityError::Rejected {
            code: "weak-password".into(),
            detail: Some(format!("Password should be at least {MIN_PASSWORD_LEN} characters")),
        });
    }
    Ok(())
}

#[must_use]
pub(crate) fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

fn generate_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
