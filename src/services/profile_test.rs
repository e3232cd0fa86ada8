use super::*;
use crate::store::MemoryStore;
use serde_json::json;

fn identity(display_name: Option<&str>, email: Option<&str>) -> AuthIdentity {
    AuthIdentity {
        uid: "uid-1".into(),
        display_name: display_name.map(str::to_owned),
        email: email.map(str::to_owned),
    }
}

// =============================================================================
// derive_username
// =============================================================================

#[test]
fn display_name_wins() {
    assert_eq!(derive_username(Some("Alice"), Some("alice@x.com")), "Alice");
}

#[test]
fn email_local_part_when_no_display_name() {
    assert_eq!(derive_username(None, Some("bob@x.com")), "bob");
    assert_eq!(derive_username(Some(""), Some("bob@x.com")), "bob");
}

#[test]
fn email_without_at_is_used_whole() {
    assert_eq!(derive_username(None, Some("bob")), "bob");
}

#[test]
fn falls_back_to_farmer() {
    assert_eq!(derive_username(None, None), "Farmer");
    assert_eq!(derive_username(Some(""), Some("")), "Farmer");
    assert_eq!(derive_username(None, Some("@x.com")), "Farmer");
}

// =============================================================================
// profile_fields
// =============================================================================

#[test]
fn profile_fields_always_write_password_provider() {
    let doc = profile_fields(&identity(None, Some("bob@x.com")));
    assert_eq!(doc["uid"], json!("uid-1"));
    assert_eq!(doc["displayName"], serde_json::Value::Null);
    assert_eq!(doc["email"], json!("bob@x.com"));
    assert_eq!(doc["provider"], json!("password"));
    assert_eq!(doc.len(), 4);
}

// =============================================================================
// upsert_profile_and_route
// =============================================================================

#[tokio::test]
async fn upsert_writes_under_derived_username() {
    let store = MemoryStore::new();
    let username = upsert_profile_and_route(&store, &identity(None, Some("bob@x.com")), None)
        .await
        .unwrap();
    assert_eq!(username, "bob");

    let path = DocumentPath::new(USERS_COLLECTION, "bob").unwrap();
    let stored = store.get(&path, None).await.unwrap().unwrap();
    assert_eq!(stored["uid"], json!("uid-1"));
}

#[tokio::test]
async fn upsert_preserves_existing_custom_fields() {
    let store = MemoryStore::new();
    let path = DocumentPath::new(USERS_COLLECTION, "Alice").unwrap();
    let seed = json!({ "uid": "uid-1", "customField": "barn" })
        .as_object()
        .cloned()
        .unwrap();
    store.merge(&path, &seed, None).await.unwrap();

    upsert_profile_and_route(&store, &identity(Some("Alice"), Some("alice@x.com")), None)
        .await
        .unwrap();

    let stored = store.get(&path, None).await.unwrap().unwrap();
    assert_eq!(stored["customField"], json!("barn"));
    assert_eq!(stored["email"], json!("alice@x.com"));
}

#[tokio::test]
async fn changed_display_name_writes_a_second_document() {
    let store = MemoryStore::new();
    upsert_profile_and_route(&store, &identity(Some("Alice"), Some("alice@x.com")), None)
        .await
        .unwrap();
    upsert_profile_and_route(&store, &identity(Some("Alicia"), Some("alice@x.com")), None)
        .await
        .unwrap();
    assert_eq!(store.count(USERS_COLLECTION).await, 2);
}

#[tokio::test]
async fn username_with_slash_is_rejected() {
    let store = MemoryStore::new();
    let err = upsert_profile_and_route(&store, &identity(Some("Barn/Owl"), None), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPath(_)));
    assert_eq!(store.count(USERS_COLLECTION).await, 0);
}

#[tokio::test]
async fn load_profile_reads_the_upserted_document() {
    let store = MemoryStore::new();
    let carol = identity(None, Some("carol@x.com"));
    assert!(load_profile(&store, &carol, None).await.unwrap().is_none());

    upsert_profile_and_route(&store, &carol, None).await.unwrap();
    let doc = load_profile(&store, &carol, None).await.unwrap().expect("profile");
    assert_eq!(doc["email"], json!("carol@x.com"));
    assert_eq!(doc["provider"], json!("password"));
}

// =============================================================================
// dashboard_route
// =============================================================================

#[test]
fn dashboard_route_url_encodes_name() {
    assert_eq!(dashboard_route("bob"), "/dashboard?name=bob");
    assert_eq!(dashboard_route("Old MacDonald"), "/dashboard?name=Old%20MacDonald");
    assert_eq!(dashboard_route("a&b=c"), "/dashboard?name=a%26b%3Dc");
}
