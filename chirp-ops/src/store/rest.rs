use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::value::{decode_fields, document_id, encode_fields, encode_value};
use super::{Document, DocumentStore, StoreError, StoreResult, StoredDocument, MAX_BATCH_WRITES};

/// Page size used when listing a collection
const LIST_PAGE_SIZE: u32 = 300;

/// Document store client for the managed database's REST API
#[derive(Clone)]
pub struct RestDocumentStore {
    client: Client,
    base_url: String,
    project_id: String,
    api_key: Option<String>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    document: Option<RawDocument>,
}

impl RawDocument {
    fn into_stored(self) -> StoreResult<StoredDocument> {
        Ok(StoredDocument {
            id: document_id(&self.name).to_string(),
            data: decode_fields(&self.fields)?,
        })
    }
}

impl RestDocumentStore {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            api_key: None,
            id_token: None,
        }
    }

    /// API key sent as the `key` query parameter
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Identity token of a signed-in user, sent as a bearer token
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = id_token;
        self
    }

    /// Resource path of the database's document root
    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database_path())
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.documents_url(), urlencoding::encode(collection))
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id)
        )
    }

    /// Full resource name used inside commit writes
    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.database_path(), collection, id)
    }

    /// Helper to add credentials to a request
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = match &self.api_key {
            Some(key) => req.query(&[("key", key)]),
            None => req,
        };
        match &self.id_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Helper to map non-success responses onto store errors
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(StoreError::Unauthorized(message))
            }
            _ => Err(StoreError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn create(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        let req = self
            .client
            .post(self.collection_url(collection))
            .query(&[("documentId", id)])
            .json(&json!({ "fields": encode_fields(&document) }));
        let response = self.authorize(req).send().await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let req = self.client.get(self.document_url(collection, id));
        let response = self.authorize(req).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = Self::check(response).await?.json().await?;
        Ok(Some(raw.into_stored()?))
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let req = self
            .client
            .patch(self.document_url(collection, id))
            .query(&params)
            .json(&json!({ "fields": encode_fields(&fields) }));
        let response = self.authorize(req).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredDocument>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(self.collection_url(collection))
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }

            let page: ListResponse = Self::check(self.authorize(req).send().await?)
                .await?
                .json()
                .await?;

            for raw in page.documents {
                documents.push(raw.into_stored()?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Listed {} documents from {}", documents.len(), collection);
        Ok(documents)
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredDocument>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let req = self
            .client
            .post(format!("{}:runQuery", self.documents_url()))
            .json(&body);
        let rows: Vec<QueryRow> = Self::check(self.authorize(req).send().await?)
            .await?
            .json()
            .await?;

        // Rows without a document only carry read metadata
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(RawDocument::into_stored)
            .collect()
    }

    async fn delete_batch(&self, collection: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.len() > MAX_BATCH_WRITES {
            return Err(StoreError::BatchTooLarge(ids.len()));
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let writes: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "delete": self.document_name(collection, id) }))
            .collect();

        let req = self
            .client
            .post(format!("{}:commit", self.documents_url()))
            .json(&json!({ "writes": writes }));
        Self::check(self.authorize(req).send().await?).await?;

        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        let store = RestDocumentStore::new("http://localhost:8080/v1/", "chirp-dev");

        assert_eq!(
            store.documents_url(),
            "http://localhost:8080/v1/projects/chirp-dev/databases/(default)/documents"
        );
        assert_eq!(
            store.document_url("users", "a b"),
            "http://localhost:8080/v1/projects/chirp-dev/databases/(default)/documents/users/a%20b"
        );
        assert_eq!(
            store.document_name("posts", "p1"),
            "projects/chirp-dev/databases/(default)/documents/posts/p1"
        );
    }

    #[tokio::test]
    async fn test_delete_batch_rejects_oversized_batches() {
        let store = RestDocumentStore::new("http://127.0.0.1:9", "chirp-dev");
        let ids: Vec<String> = (0..=MAX_BATCH_WRITES).map(|i| i.to_string()).collect();

        let err = store
            .delete_batch("posts", &ids)
            .await
            .expect_err("oversized batch must fail");
        assert!(matches!(err, StoreError::BatchTooLarge(501)));
    }
}
