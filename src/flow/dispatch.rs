//! Auth action dispatcher: runs a sign-in attempt end to end.
//!
//! DESIGN
//! ======
//! A submit goes identity provider → session registry → profile upsert →
//! navigation. The page host is injected as a `Navigator` + `Notifier` pair,
//! so the HTTP layer and tests observe the same calls. Every failure,
//! whichever service raised it, reaches the user as one alert carrying the
//! error's message.
//!
//! The session is marked signed in as soon as the identity provider accepts
//! the credentials. A failed display-name update or profile write after that
//! point alerts and stays on the login page, but does not sign the session
//! out.

use crate::identity::{IdentityError, IdentityProvider, SignedInUser};
use crate::services::profile::{dashboard_route, upsert_profile_and_route};
use crate::services::session::SessionRegistry;
use crate::store::{DocumentStore, StoreError};

use super::form::CredentialForm;

// =============================================================================
// HOST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}

pub trait Navigator {
    fn navigate(&mut self, to: &str, options: NavigateOptions);
}

pub trait Notifier {
    /// Show a blocking message to the user.
    fn alert(&mut self, message: &str);
}

// =============================================================================
// ERRORS / OUTCOME
// =============================================================================

/// Anything an external auth or store call can reject with.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Signed in, profile written, navigation issued.
    Completed { session_token: String, username: String },
    /// Signed in, but setting the display name or writing the profile
    /// failed; no navigation.
    ProfileFailed { session_token: String },
    /// The identity provider rejected the attempt.
    Rejected,
    /// A submit was already in flight.
    Ignored,
}

impl SubmitOutcome {
    /// Session token to hand back to the browser, if the attempt signed in.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        match self {
            Self::Completed { session_token, .. } | Self::ProfileFailed { session_token } => Some(session_token),
            Self::Rejected | Self::Ignored => None,
        }
    }
}

/// Result of the identity-provider half of an attempt.
enum Attempt {
    SignedIn(SignedInUser),
    Rejected(IdentityError),
    /// The account exists and is signed in, but its display name was not set.
    NameFailed(SignedInUser, IdentityError),
}

impl From<Result<SignedInUser, IdentityError>> for Attempt {
    fn from(result: Result<SignedInUser, IdentityError>) -> Self {
        match result {
            Ok(user) => Self::SignedIn(user),
            Err(e) => Self::Rejected(e),
        }
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

pub struct AuthDispatcher<'a> {
    identity: &'a dyn IdentityProvider,
    store: &'a dyn DocumentStore,
    sessions: &'a SessionRegistry,
}

impl<'a> AuthDispatcher<'a> {
    #[must_use]
    pub fn new(identity: &'a dyn IdentityProvider, store: &'a dyn DocumentStore, sessions: &'a SessionRegistry) -> Self {
        Self { identity, store, sessions }
    }

    /// Submit the credential form in its current mode.
    ///
    /// Signup creates the account and, when a name was typed, sets it as the
    /// display name. Login signs in. `session` is the caller's existing
    /// session token, if any.
    pub async fn on_submit<H>(&self, form: &mut CredentialForm, session: Option<&str>, host: &mut H) -> SubmitOutcome
    where
        H: Navigator + Notifier + Send,
    {
        if form.submitting {
            return SubmitOutcome::Ignored;
        }
        form.submitting = true;

        let token = self.sessions.begin_sign_in(session);
        let attempt = self.password_attempt(form).await;
        let outcome = self.finish(token, attempt, host).await;

        form.submitting = false;
        outcome
    }

    /// Sign in with a Google ID token from the browser popup.
    pub async fn on_google_click<H>(
        &self,
        form: &mut CredentialForm,
        id_token: &str,
        session: Option<&str>,
        host: &mut H,
    ) -> SubmitOutcome
    where
        H: Navigator + Notifier + Send,
    {
        if form.submitting {
            return SubmitOutcome::Ignored;
        }
        form.submitting = true;

        let token = self.sessions.begin_sign_in(session);
        let attempt = self.identity.sign_in_with_google(id_token).await.into();
        let outcome = self.finish(token, attempt, host).await;

        form.submitting = false;
        outcome
    }

    async fn password_attempt(&self, form: &CredentialForm) -> Attempt {
        if !form.is_signup() {
            return self.identity.sign_in(&form.email, &form.password).await.into();
        }

        let user = match self.identity.create_user(&form.email, &form.password).await {
            Ok(user) => user,
            Err(e) => return Attempt::Rejected(e),
        };
        let Some(name) = form.display_name() else {
            return Attempt::SignedIn(user);
        };
        match self.identity.update_display_name(&user, name).await {
            Ok(named) => Attempt::SignedIn(named),
            Err(e) => Attempt::NameFailed(user, e),
        }
    }

    async fn finish<H>(&self, token: String, attempt: Attempt, host: &mut H) -> SubmitOutcome
    where
        H: Navigator + Notifier + Send,
    {
        let user = match attempt {
            Attempt::SignedIn(user) => user,
            Attempt::Rejected(e) => {
                self.sessions.abort_sign_in(&token);
                tracing::info!(code = e.code().unwrap_or("none"), "sign-in rejected");
                host.alert(&FlowError::from(e).to_string());
                return SubmitOutcome::Rejected;
            }
            Attempt::NameFailed(user, e) => {
                let uid = user.identity.uid.clone();
                self.sessions.complete_sign_in(&token, user);
                tracing::warn!(%uid, code = e.code().unwrap_or("none"), "display name update failed");
                host.alert(&FlowError::from(e).to_string());
                return SubmitOutcome::ProfileFailed { session_token: token };
            }
        };

        let identity = user.identity.clone();
        let bearer = user.id_token.clone();
        self.sessions.complete_sign_in(&token, user);
        tracing::info!(uid = %identity.uid, "signed in");

        match upsert_profile_and_route(self.store, &identity, Some(&bearer)).await {
            Ok(username) => {
                host.navigate(&dashboard_route(&username), NavigateOptions::default());
                SubmitOutcome::Completed { session_token: token, username }
            }
            Err(e) => {
                tracing::warn!(uid = %identity.uid, error = %e, "profile upsert failed");
                host.alert(&FlowError::from(e).to_string());
                SubmitOutcome::ProfileFailed { session_token: token }
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
