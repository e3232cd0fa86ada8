//! In-memory document store with Firestore merge semantics.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{Document, DocumentPath, DocumentStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<DocumentPath, Document>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents in `collection`.
    #[cfg(test)]
    pub async fn count(&self, collection: &str) -> usize {
        self.docs
            .read()
            .await
            .keys()
            .filter(|p| p.collection == collection)
            .count()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn merge(&self, path: &DocumentPath, fields: &Document, _bearer: Option<&str>) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        let doc = docs.entry(path.clone()).or_default();
        for (key, value) in fields {
            doc.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn get(&self, path: &DocumentPath, _bearer: Option<&str>) -> Result<Option<Document>, StoreError> {
        Ok(self.docs.read().await.get(path).cloned())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
