use anyhow::{Context, Result};
use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;
use serde_json::Value;
use std::path::Path;

use super::{Document, DocumentStore, StoreError, StoreResult, StoredDocument, MAX_BATCH_WRITES};

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

/// Tables backing the local emulator. `accounts` stands in for the identity
/// provider and only ever holds throwaway test credentials.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE TABLE IF NOT EXISTS accounts (
    email TEXT PRIMARY KEY,
    uid TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();

        // Every in-memory connection is its own database, so share a single one
        let pool = if path_str.trim().eq_ignore_ascii_case(MEMORY_DB_PATH) {
            Pool::builder()
                .max_size(1)
                .build(SqliteConnectionManager::memory())
        } else {
            Pool::new(SqliteConnectionManager::file(path))
        }
        .context("Failed to create database connection pool")?;

        Ok(Self { pool })
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}

/// Local stand-in for the hosted document database
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fresh in-memory store with the schema applied
    pub fn in_memory() -> Result<Self> {
        let db = Database::in_memory()?;
        db.initialize()?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let conn = self.db.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn parse_document(id: String, data: &str) -> StoreResult<StoredDocument> {
        match serde_json::from_str::<Value>(data)? {
            Value::Object(map) => Ok(StoredDocument { id, data: map }),
            other => Err(StoreError::InvalidResponse(format!(
                "document {} is not an object: {}",
                id, other
            ))),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        let conn = self.db.pool.get()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO documents (collection, id, data, updated_at)
             VALUES (?, ?, ?, ?)",
            (
                collection,
                id,
                serde_json::to_string(&document)?,
                chrono::Utc::now().to_rfc3339(),
            ),
        )?;

        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let conn = self.db.pool.get()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND id = ?",
                (collection, id),
                |row| row.get(0),
            )
            .optional()?;

        data.map(|d| Self::parse_document(id.to_string(), &d))
            .transpose()
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let mut conn = self.db.pool.get()?;
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND id = ?",
                (collection, id),
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };

        let mut merged = Self::parse_document(id.to_string(), &current)?.data;
        merged.extend(fields);

        tx.execute(
            "UPDATE documents SET data = ?, updated_at = ? WHERE collection = ? AND id = ?",
            (
                serde_json::to_string(&merged)?,
                chrono::Utc::now().to_rfc3339(),
                collection,
                id,
            ),
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        let conn = self.db.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")?;

        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, data)| Self::parse_document(id, &data))
            .collect()
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredDocument>> {
        let documents = self.list(collection).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| doc.data.get(field) == Some(value))
            .collect())
    }

    async fn delete_batch(&self, collection: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.len() > MAX_BATCH_WRITES {
            return Err(StoreError::BatchTooLarge(ids.len()));
        }

        let mut conn = self.db.pool.get()?;
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                (collection, id),
            )?;
        }
        tx.commit()?;

        // Deleting a missing document still counts as a committed write
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().expect("object").clone()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SqliteDocumentStore::in_memory().expect("store");
        store
            .create("users", "u1", doc(json!({ "email": "a@test.com" })))
            .await
            .expect("create");

        let fetched = store.get("users", "u1").await.expect("get").expect("exists");
        assert_eq!(fetched.field_str("email"), Some("a@test.com"));
        assert!(store.get("users", "missing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_ids() {
        let store = SqliteDocumentStore::in_memory().expect("store");
        store.create("posts", "p1", doc(json!({}))).await.expect("create");

        let err = store
            .create("posts", "p1", doc(json!({})))
            .await
            .expect_err("duplicate id");
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = SqliteDocumentStore::in_memory().expect("store");
        store
            .create("posts", "p1", doc(json!({ "content": "hi", "likeCount": 0 })))
            .await
            .expect("create");

        store
            .update("posts", "p1", doc(json!({ "likeCount": 3 })))
            .await
            .expect("update");

        let fetched = store.get("posts", "p1").await.expect("get").expect("exists");
        assert_eq!(fetched.data["content"], "hi");
        assert_eq!(fetched.data["likeCount"], 3);

        let err = store
            .update("posts", "nope", doc(json!({ "likeCount": 1 })))
            .await
            .expect_err("missing document");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_query_eq_and_delete_batch() {
        let store = SqliteDocumentStore::in_memory().expect("store");
        for (id, author) in [("p1", "u1"), ("p2", "u2"), ("p3", "u1")] {
            store
                .create("posts", id, doc(json!({ "authorId": author })))
                .await
                .expect("create");
        }

        let mine = store
            .query_eq("posts", "authorId", &json!("u1"))
            .await
            .expect("query");
        let ids: Vec<String> = mine.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["p1".to_string(), "p3".to_string()]);

        let deleted = store.delete_batch("posts", &ids).await.expect("delete");
        assert_eq!(deleted, 2);
        assert_eq!(store.count("posts").expect("count"), 1);
    }
}
