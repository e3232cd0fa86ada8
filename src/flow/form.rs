//! Credential form state for the login/signup page.
//!
//! Plain state container: the page handler rebuilds it from the posted form,
//! the dispatcher mutates `submitting`, and the view renders it back.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

impl AuthMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Login => Self::Signup,
            Self::Signup => Self::Login,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialForm {
    pub mode: AuthMode,
    pub name: String,
    pub email: String,
    pub password: String,
    pub submitting: bool,
}

impl CredentialForm {
    #[must_use]
    pub fn new(mode: AuthMode) -> Self {
        Self { mode, ..Self::default() }
    }

    #[must_use]
    pub fn is_signup(&self) -> bool {
        self.mode == AuthMode::Signup
    }

    /// Flip between login and signup. Typed fields are kept.
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    /// The name to apply as display name, if one was typed.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
