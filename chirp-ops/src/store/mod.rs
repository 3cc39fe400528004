//! Access to the hosted document database.
//!
//! The tools only need flat documents in named top-level collections, so the
//! [`DocumentStore`] trait exposes exactly that surface. [`RestDocumentStore`]
//! talks to the managed service; [`SqliteDocumentStore`] emulates it locally.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{Settings, StoreBackend};

pub mod rest;
pub mod sqlite;
pub mod value;

pub use rest::RestDocumentStore;
pub use sqlite::{Database, SqliteDocumentStore};

/// Most writes the store accepts in a single commit
pub const MAX_BATCH_WRITES: usize = 500;

/// Top-level fields of a document
pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("Batch of {0} writes exceeds the limit of {MAX_BATCH_WRITES}")]
    BatchTooLarge(usize),

    #[error("Store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A document together with its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    /// String value of a top-level field
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// Deserialize into a typed model, filling `id` from the document key
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.entry("id").or_insert_with(|| Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// Convert a serializable model into document fields
pub fn to_document<T: serde::Serialize>(model: &T) -> StoreResult<Document> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidResponse(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a caller-chosen id; fails if it already exists
    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<()>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>>;

    /// Merge `fields` into an existing document
    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()>;

    /// Every document in a collection
    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredDocument>>;

    /// Documents whose top-level `field` equals `value`
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredDocument>>;

    /// Delete up to [`MAX_BATCH_WRITES`] documents atomically; returns the writes committed
    async fn delete_batch(&self, collection: &str, ids: &[String]) -> StoreResult<usize>;
}

/// Open the configured store backend.
///
/// `id_token` authenticates REST requests as a signed-in user; the local
/// emulator ignores it.
pub fn open(settings: &Settings, id_token: Option<String>) -> Result<Box<dyn DocumentStore>> {
    match settings.store.backend {
        StoreBackend::Rest => {
            let project_id = crate::config::require(&settings.store.project_id, "store.project_id")?;
            let store = RestDocumentStore::new(&settings.store.base_url, project_id)
                .with_api_key(settings.store.api_key.clone())
                .with_id_token(id_token);
            Ok(Box::new(store))
        }
        StoreBackend::Sqlite => {
            let db = Database::new(&settings.store.sqlite_path)?;
            db.initialize()?;
            Ok(Box::new(SqliteDocumentStore::new(db)))
        }
    }
}
