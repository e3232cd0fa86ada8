//! Document stores: merge-writes for user profile documents.
//!
//! ARCHITECTURE
//! ============
//! Profile upserts go through the `DocumentStore` trait. Three backends:
//! Firestore over REST, a Postgres `jsonb` table, and an in-memory map. All of
//! them implement the same merge contract: fields named in a write replace the
//! stored values, every other stored field is left untouched.

pub mod firestore;
pub mod memory;
pub mod postgres;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Top-level document fields.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Address of a single document: `{collection}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    /// Build a path, rejecting ids the backends cannot address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] when either segment is empty or
    /// contains `/`, or when the id is `.` or `..`.
    pub fn new(collection: &str, id: &str) -> Result<Self, StoreError> {
        for segment in [collection, id] {
            if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
                return Err(StoreError::InvalidPath(format!("{collection}/{id}")));
            }
        }
        Ok(Self { collection: collection.to_owned(), id: id.to_owned() })
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Errors produced by document store calls. `Display` is user-facing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document path cannot be used as a store key.
    #[error("Invalid document reference: {0}")]
    InvalidPath(String),

    /// The store rejected the write (permissions, quota, bad request).
    #[error("{message}")]
    Rejected { status: String, message: String },

    /// The request never reached the store.
    #[error("Failed to reach the document store: {0}")]
    Network(String),

    /// The store response could not be decoded.
    #[error("Unexpected document store response: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// External document store used for profile upserts.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merge `fields` into the document at `path`, creating it if missing.
    ///
    /// `bearer` is the signed-in user's ID token; backends without access
    /// rules ignore it.
    async fn merge(&self, path: &DocumentPath, fields: &Document, bearer: Option<&str>) -> Result<(), StoreError>;

    /// Read the document at `path`, or `None` if it does not exist.
    ///
    /// Serves `GET /api/profile`; `bearer` is applied as for
    /// [`merge`](Self::merge).
    async fn get(&self, path: &DocumentPath, bearer: Option<&str>) -> Result<Option<Document>, StoreError>;
}
