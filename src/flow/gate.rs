//! Dashboard gate: welcome signed-in sessions, bounce everyone else.
//!
//! The gate subscribes to the session's auth state when mounted and holds the
//! subscription until dropped. It starts in `Loading` while a sign-in is in
//! flight and settles on `Authenticated` or `Unauthenticated`.

use crate::services::profile::derive_username;
use crate::services::session::{AuthState, AuthSubscription, SessionRegistry};

use super::dispatch::NavigateOptions;

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Authenticated { name: String },
    Unauthenticated,
}

/// What the page should do for the current gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView {
    Spinner,
    Welcome { name: String },
    Redirect { to: &'static str, options: NavigateOptions },
}

pub struct DashboardGate {
    subscription: AuthSubscription,
    name_param: Option<String>,
    state: GateState,
}

impl DashboardGate {
    /// Subscribe to `session`'s auth state. `name_param` is the `?name=`
    /// query value.
    #[must_use]
    pub fn mount(sessions: &SessionRegistry, session: Option<&str>, name_param: Option<String>) -> Self {
        let subscription = sessions.subscribe(session);
        let state = resolve(&subscription.current(), name_param.as_deref());
        Self { subscription, name_param, state }
    }

    #[must_use]
    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Wait for the auth state to leave `Loading`.
    pub async fn settle(&mut self) -> &GateState {
        let auth = self.subscription.settled().await;
        self.state = resolve(&auth, self.name_param.as_deref());
        &self.state
    }

    #[must_use]
    pub fn view(&self) -> GateView {
        match &self.state {
            GateState::Loading => GateView::Spinner,
            GateState::Authenticated { name } => GateView::Welcome { name: name.clone() },
            GateState::Unauthenticated => GateView::Redirect { to: LOGIN_PATH, options: NavigateOptions { replace: true } },
        }
    }
}

/// A missing or empty `?name=` falls back to the username derived from the
/// signed-in identity.
fn resolve(auth: &AuthState, name_param: Option<&str>) -> GateState {
    match auth {
        AuthState::Loading => GateState::Loading,
        AuthState::SignedOut => GateState::Unauthenticated,
        AuthState::SignedIn(identity) => {
            let name = name_param
                .filter(|n| !n.is_empty())
                .map_or_else(
                    || derive_username(identity.display_name.as_deref(), identity.email.as_deref()),
                    str::to_owned,
                );
            GateState::Authenticated { name }
        }
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
