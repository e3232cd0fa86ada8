//! Session registry and auth-state subscriptions.
//!
//! ARCHITECTURE
//! ============
//! Each browser session is identified by a random `session_token` cookie.
//! The registry keeps, per token, a `watch` channel carrying the session's
//! `AuthState` and the signed-in user's provider tokens. Handlers subscribe
//! through [`SessionRegistry::subscribe`]; dropping the returned
//! [`AuthSubscription`] unsubscribes.
//!
//! TRADE-OFFS
//! ==========
//! Sessions live in process memory and are lost on restart. A client-supplied
//! token that the registry does not know is never adopted; sign-in always
//! mints a fresh one in that case. Sessions expire [`SESSION_TTL`] after
//! their last sign-in and are pruned whenever a new attempt begins.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;

use crate::identity::{AuthIdentity, SignedInUser};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// AUTH STATE
// =============================================================================

/// Auth state of one session, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthState {
    /// A sign-in is in flight; the outcome is not known yet.
    Loading,
    SignedIn(AuthIdentity),
    SignedOut,
}

impl AuthState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[cfg(test)]
    #[must_use]
    pub fn identity(&self) -> Option<&AuthIdentity> {
        match self {
            Self::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

/// How long a session stays valid after its last sign-in activity. The
/// session cookie carries the same max-age.
pub const SESSION_TTL: Duration = Duration::days(7);

struct SessionEntry {
    tx: watch::Sender<AuthState>,
    user: Option<SignedInUser>,
    /// State to restore once every in-flight attempt has failed. `None` for
    /// a session created by a sign-in that has not succeeded yet.
    restore: Option<AuthState>,
    /// Sign-in attempts begun but not yet completed or aborted.
    pending: usize,
    /// Refreshed by every begin and complete.
    expires_at: OffsetDateTime,
}

impl SessionEntry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Shared registry of live sessions. Clone is cheap.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { inner: Arc::default(), ttl }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop expired sessions; their subscribers see `SignedOut`.
    fn prune(sessions: &mut HashMap<String, SessionEntry>, now: OffsetDateTime) {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                entry.tx.send_replace(AuthState::SignedOut);
            }
            live
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "expired sessions pruned");
        }
    }

    /// Mark a sign-in as in flight and return the session token to use.
    ///
    /// A known, unexpired `token` is reused and its subscribers see
    /// `Loading`; otherwise a new session is created.
    pub fn begin_sign_in(&self, token: Option<&str>) -> String {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.lock();
        Self::prune(&mut sessions, now);

        if let Some(token) = token {
            if let Some(entry) = sessions.get_mut(token) {
                if entry.pending == 0 {
                    entry.restore = Some(entry.tx.borrow().clone());
                }
                entry.pending += 1;
                entry.expires_at = now + self.ttl;
                entry.tx.send_replace(AuthState::Loading);
                return token.to_owned();
            }
        }

        let token = generate_token();
        let (tx, _rx) = watch::channel(AuthState::Loading);
        let entry = SessionEntry { tx, user: None, restore: None, pending: 1, expires_at: now + self.ttl };
        sessions.insert(token.clone(), entry);
        token
    }

    /// Publish a successful sign-in.
    pub fn complete_sign_in(&self, token: &str, user: SignedInUser) {
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(token) else {
            tracing::warn!("sign-in completed for unknown session");
            return;
        };
        let signed_in = AuthState::SignedIn(user.identity.clone());
        entry.pending = entry.pending.saturating_sub(1);
        entry.restore = Some(signed_in.clone());
        entry.expires_at = OffsetDateTime::now_utc() + self.ttl;
        entry.user = Some(user);
        entry.tx.send_replace(signed_in);
    }

    /// Undo [`begin_sign_in`](Self::begin_sign_in) after a failed attempt.
    ///
    /// While other attempts on the session are still in flight nothing
    /// changes. Otherwise an existing session returns to its last settled
    /// state, and a session that never signed in is signed out and dropped.
    pub fn abort_sign_in(&self, token: &str) {
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(token) else {
            return;
        };
        entry.pending = entry.pending.saturating_sub(1);
        if entry.pending > 0 {
            return;
        }
        match entry.restore.take() {
            Some(previous) => {
                entry.tx.send_replace(previous);
            }
            None => {
                entry.tx.send_replace(AuthState::SignedOut);
                sessions.remove(token);
            }
        }
    }

    /// Sign the session out and forget it. Returns whether it existed.
    pub fn sign_out(&self, token: &str) -> bool {
        let mut sessions = self.lock();
        let Some(entry) = sessions.remove(token) else {
            return false;
        };
        entry.tx.send_replace(AuthState::SignedOut);
        true
    }

    /// Current auth state; unknown or absent tokens are signed out.
    #[must_use]
    pub fn current(&self, token: Option<&str>) -> AuthState {
        let now = OffsetDateTime::now_utc();
        token
            .and_then(|t| {
                self.lock()
                    .get(t)
                    .filter(|e| e.is_live(now))
                    .map(|e| e.tx.borrow().clone())
            })
            .unwrap_or(AuthState::SignedOut)
    }

    /// The signed-in user with provider tokens, if any.
    #[must_use]
    pub fn user(&self, token: Option<&str>) -> Option<SignedInUser> {
        let now = OffsetDateTime::now_utc();
        token.and_then(|t| {
            self.lock()
                .get(t)
                .filter(|e| e.is_live(now))
                .and_then(|e| e.user.clone())
        })
    }

    /// Subscribe to the session's auth state. An unknown or absent token
    /// yields a subscription that is permanently signed out.
    #[must_use]
    pub fn subscribe(&self, token: Option<&str>) -> AuthSubscription {
        let now = OffsetDateTime::now_utc();
        let rx = token.and_then(|t| {
            self.lock()
                .get(t)
                .filter(|e| e.is_live(now))
                .map(|e| e.tx.subscribe())
        });
        let rx = rx.unwrap_or_else(|| watch::channel(AuthState::SignedOut).1);
        tracing::debug!("auth subscription registered");
        AuthSubscription { rx }
    }

    /// Live subscriptions on `token`.
    #[cfg(test)]
    #[must_use]
    pub fn subscriber_count(&self, token: &str) -> usize {
        self.lock()
            .get(token)
            .map_or(0, |e| e.tx.receiver_count())
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle on a session's auth-state stream. Dropping it unsubscribes.
pub struct AuthSubscription {
    rx: watch::Receiver<AuthState>,
}

impl AuthSubscription {
    /// Latest published state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// Wait for the next state change. Returns `false` once the session is
    /// gone and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the state is no longer `Loading` and return it.
    pub async fn settled(&mut self) -> AuthState {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if !state.is_loading() {
                return state;
            }
            if self.rx.changed().await.is_err() {
                return self.current();
            }
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        tracing::debug!("auth subscription released");
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
