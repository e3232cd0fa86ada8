//! Runtime configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` with dotenvy, then builds an `AppConfig` here. Firebase
//! settings are optional: without them the server runs against the in-memory
//! identity provider and profile store.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),

    #[error("missing required env var {var}")]
    Missing { var: String },
}

// =============================================================================
// FIREBASE
// =============================================================================

/// Public Firebase web-app identifiers. None of these are secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    pub identity_url: String,
    pub firestore_url: String,
    pub timeouts: HttpTimeouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

impl FirebaseConfig {
    /// Load from `FIREBASE_*` env vars. Returns `None` when `FIREBASE_API_KEY`
    /// or `FIREBASE_PROJECT_ID` is missing (Firebase backends disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env_nonempty("FIREBASE_API_KEY")?;
        let project_id = env_nonempty("FIREBASE_PROJECT_ID")?;
        let auth_domain = env_nonempty("FIREBASE_AUTH_DOMAIN").unwrap_or_else(|| format!("{project_id}.firebaseapp.com"));
        let storage_bucket = env_nonempty("FIREBASE_STORAGE_BUCKET").unwrap_or_default();
        let messaging_sender_id = env_nonempty("FIREBASE_MESSAGING_SENDER_ID").unwrap_or_default();
        let app_id = env_nonempty("FIREBASE_APP_ID").unwrap_or_default();
        let identity_url = base_url("FIREBASE_IDENTITY_URL", DEFAULT_IDENTITY_URL);
        let firestore_url = base_url("FIRESTORE_URL", DEFAULT_FIRESTORE_URL);
        let timeouts = HttpTimeouts {
            request_secs: env_parse("FIREBASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("FIREBASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Some(Self {
            api_key,
            auth_domain,
            project_id,
            storage_bucket,
            messaging_sender_id,
            app_id,
            identity_url,
            firestore_url,
            timeouts,
        })
    }

    /// Firebase web-app config object, as the browser SDK expects it.
    #[must_use]
    pub fn web_config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "apiKey": self.api_key,
            "authDomain": self.auth_domain,
            "projectId": self.project_id,
            "storageBucket": self.storage_bucket,
            "messagingSenderId": self.messaging_sender_id,
            "appId": self.app_id,
        })
    }
}

// =============================================================================
// PROFILE STORE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Firestore,
    Postgres,
    Memory,
}

fn parse_store_kind(raw: Option<&str>, firebase_configured: bool) -> Result<StoreKind, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(if firebase_configured { StoreKind::Firestore } else { StoreKind::Memory }),
        Some("firestore") => Ok(StoreKind::Firestore),
        Some("postgres") => Ok(StoreKind::Postgres),
        Some("memory") => Ok(StoreKind::Memory),
        Some(other) => Err(ConfigError::Parse(format!("unknown PROFILE_STORE: {other}"))),
    }
}

// =============================================================================
// APP
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub firebase: Option<FirebaseConfig>,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub cookie_secure: bool,
}

impl AppConfig {
    /// Build typed app config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` or `PROFILE_STORE` is malformed, if
    /// `PROFILE_STORE=firestore` is requested without Firebase settings, or if
    /// `PROFILE_STORE=postgres` is requested without `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env_nonempty("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Parse(format!("invalid PORT: {raw}")))?,
            None => DEFAULT_PORT,
        };

        let firebase = FirebaseConfig::from_env();
        let store = parse_store_kind(std::env::var("PROFILE_STORE").ok().as_deref(), firebase.is_some())?;
        if store == StoreKind::Firestore && firebase.is_none() {
            return Err(ConfigError::Missing { var: "FIREBASE_API_KEY".into() });
        }

        let database_url = env_nonempty("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing { var: "DATABASE_URL".into() });
        }

        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or(firebase.is_some());

        Ok(Self { port, firebase, store, database_url, cookie_secure })
    }
}

// =============================================================================
// ENV HELPERS
// =============================================================================

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn base_url(key: &str, default: &str) -> String {
    env_nonempty(key)
        .unwrap_or_else(|| default.to_owned())
        .trim_end_matches('/')
        .to_owned()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
