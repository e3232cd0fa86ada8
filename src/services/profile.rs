//! User profile upsert and dashboard routing.
//!
//! The profile document is keyed by a username derived from the identity on
//! every sign-in; nothing stores or looks up a previous username. A user whose
//! display name changes therefore gets a second document under the new name.

use serde_json::Value;

use crate::identity::AuthIdentity;
use crate::store::{Document, DocumentPath, DocumentStore, StoreError};

pub const USERS_COLLECTION: &str = "users";
pub const DEFAULT_USERNAME: &str = "Farmer";
/// Written for every sign-in path, Google included.
pub const PROFILE_PROVIDER: &str = "password";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// `display_name`, else the local part of `email`, else `"Farmer"`.
/// Empty strings count as absent at every step.
#[must_use]
pub fn derive_username(display_name: Option<&str>, email: Option<&str>) -> String {
    display_name
        .filter(|n| !n.is_empty())
        .or_else(|| {
            email
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
        })
        .unwrap_or(DEFAULT_USERNAME)
        .to_owned()
}

/// Fields written to `users/{username}`.
#[must_use]
pub fn profile_fields(identity: &AuthIdentity) -> Document {
    let mut doc = Document::new();
    doc.insert("uid".into(), Value::String(identity.uid.clone()));
    doc.insert("displayName".into(), identity.display_name.clone().map_or(Value::Null, Value::String));
    doc.insert("email".into(), identity.email.clone().map_or(Value::Null, Value::String));
    doc.insert("provider".into(), Value::String(PROFILE_PROVIDER.into()));
    doc
}

/// Merge the profile for `identity` into `users/{username}` and return the
/// username. Resolves only after the store acknowledged the write.
///
/// # Errors
///
/// Returns the store error if the username is not a valid document id or the
/// write is rejected.
pub async fn upsert_profile_and_route(
    store: &dyn DocumentStore,
    identity: &AuthIdentity,
    bearer: Option<&str>,
) -> Result<String, StoreError> {
    let username = derive_username(identity.display_name.as_deref(), identity.email.as_deref());
    let path = DocumentPath::new(USERS_COLLECTION, &username)?;
    store
        .merge(&path, &profile_fields(identity), bearer)
        .await?;
    tracing::info!(uid = %identity.uid, %path, "profile upserted");
    Ok(username)
}

/// Read back the profile document the current identity maps to.
///
/// # Errors
///
/// Returns the store error if the username is not a valid document id or the
/// read fails.
pub async fn load_profile(
    store: &dyn DocumentStore,
    identity: &AuthIdentity,
    bearer: Option<&str>,
) -> Result<Option<Document>, StoreError> {
    let username = derive_username(identity.display_name.as_deref(), identity.email.as_deref());
    let path = DocumentPath::new(USERS_COLLECTION, &username)?;
    store.get(&path, bearer).await
}

/// `/dashboard?name=<urlencoded username>`.
#[must_use]
pub fn dashboard_route(username: &str) -> String {
    format!("{DASHBOARD_PATH}?name={}", urlencoding::encode(username))
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
