//! Postgres document store backed by a single `documents` table.
//!
//! Each document is one `jsonb` row keyed by `(collection, id)`. Merge is
//! `data || EXCLUDED.data`, which replaces top-level keys present in the write
//! and keeps the rest, matching Firestore's masked `PATCH`.

use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{Document, DocumentPath, DocumentStore, StoreError};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgDocumentStore {
    async fn merge(&self, path: &DocumentPath, fields: &Document, _bearer: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO documents (collection, id, data)
              VALUES ($1, $2, $3)
              ON CONFLICT (collection, id)
              DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()",
        )
        .bind(&path.collection)
        .bind(&path.id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, path: &DocumentPath, _bearer: Option<&str>) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(&path.collection)
            .bind(&path.id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<Json<Document>, _>("data").0))
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
