//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the identity provider and document store behind trait objects, so
//! the Firebase, Postgres and in-memory backends are interchangeable, plus
//! the session registry that carries per-browser auth state.

use std::sync::Arc;

use crate::config::{AppConfig, FirebaseConfig, StoreKind};
use crate::db;
use crate::identity::{FirebaseIdentity, IdentityError, IdentityProvider, MemoryIdentity};
use crate::services::session::SessionRegistry;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore, PgDocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),
    #[error("document store: {0}")]
    Store(#[from] StoreError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0} store selected but not configured")]
    Unconfigured(&'static str),
}

/// Shared application state. Clone is required by Axum; every field is
/// Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub sessions: SessionRegistry,
    /// Public web-app config exposed to the login page. `None` when running
    /// against the in-memory identity provider.
    pub firebase: Option<FirebaseConfig>,
    pub cookie_secure: bool,
}

impl AppState {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        firebase: Option<FirebaseConfig>,
        cookie_secure: bool,
    ) -> Self {
        Self { identity, store, sessions: SessionRegistry::new(), firebase, cookie_secure }
    }

    /// Build backends from config. Connects and migrates Postgres when that
    /// store is selected.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build or the database
    /// cannot be initialized.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let identity: Arc<dyn IdentityProvider> = match &config.firebase {
            Some(firebase) => Arc::new(FirebaseIdentity::new(firebase)?),
            None => {
                tracing::warn!("firebase not configured; using in-memory identity provider");
                Arc::new(MemoryIdentity::new())
            }
        };

        let store: Arc<dyn DocumentStore> = match config.store {
            StoreKind::Firestore => {
                let firebase = config
                    .firebase
                    .as_ref()
                    .ok_or(StartupError::Unconfigured("firestore"))?;
                Arc::new(FirestoreStore::new(firebase)?)
            }
            StoreKind::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or(StartupError::Unconfigured("postgres"))?;
                Arc::new(PgDocumentStore::new(db::init_pool(url).await?))
            }
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };
        tracing::info!(store = ?config.store, "profile store ready");

        Ok(Self::new(identity, store, config.firebase.clone(), config.cookie_secure))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
