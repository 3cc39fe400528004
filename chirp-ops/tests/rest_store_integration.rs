use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use chirp_ops::auth::{AuthClient, AuthError, IdentityProvider};
use chirp_ops::store::{DocumentStore, RestDocumentStore, StoreError};

const DOCS: &str = "/v1/projects/chirp-test/databases/(default)/documents";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct MockServer {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

async fn spawn(router: Router) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Ok(format!("http://{}", addr))
}

fn user_document(id: &str, email: &str) -> Value {
    json!({
        "name": format!("projects/chirp-test/databases/(default)/documents/users/{}", id),
        "fields": {
            "email": { "stringValue": email },
            "followers": { "integerValue": "3" }
        }
    })
}

/// Minimal document database: a two-page users listing, one query result,
/// commits and a conflicting create
async fn documents(
    State(mock): State<MockServer>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();
    if let Ok(mut requests) = mock.requests.lock() {
        requests.push(Recorded {
            method: method.clone(),
            path: path.clone(),
            query: query.clone(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: serde_json::from_str(&body).unwrap_or(Value::Null),
        });
    }

    if method == Method::GET && path == format!("{}/users", DOCS) {
        if query.contains("pageToken=page-2") {
            return (
                StatusCode::OK,
                Json(json!({ "documents": [user_document("u3", "qa@example.com")] })),
            );
        }
        return (
            StatusCode::OK,
            Json(json!({
                "documents": [
                    user_document("u1", "testuser1-1@test.com"),
                    user_document("u2", "alice@example.com")
                ],
                "nextPageToken": "page-2"
            })),
        );
    }

    if method == Method::POST && path == format!("{}:runQuery", DOCS) {
        return (
            StatusCode::OK,
            Json(json!([
                { "document": user_document("u1", "testuser1-1@test.com"), "readTime": "2024-01-01T00:00:00Z" },
                { "readTime": "2024-01-01T00:00:00Z" }
            ])),
        );
    }

    if method == Method::POST && path == format!("{}:commit", DOCS) {
        return (StatusCode::OK, Json(json!({ "writeResults": [] })));
    }

    if method == Method::POST && path == format!("{}/users", DOCS) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": { "code": 409, "message": "Document already exists" } })),
        );
    }

    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "code": 404, "message": "not found" } })),
    )
}

async fn rest_store(mock: &MockServer) -> Result<RestDocumentStore> {
    let base_url = spawn(Router::new().fallback(documents).with_state(mock.clone())).await?;
    Ok(RestDocumentStore::new(format!("{}/v1", base_url), "chirp-test")
        .with_api_key(Some("web-key".to_string()))
        .with_id_token(Some("token-123".to_string())))
}

#[tokio::test]
async fn test_list_follows_page_tokens() -> Result<()> {
    let mock = MockServer::default();
    let store = rest_store(&mock).await?;

    let users = store.list("users").await?;

    let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
    assert_eq!(users[0].field_str("email"), Some("testuser1-1@test.com"));
    assert_eq!(users[0].data["followers"], json!(3));

    let requests = mock.recorded();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].query.contains("key=web-key"));
    assert!(requests[1].query.contains("pageToken=page-2"));
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer token-123"));
    Ok(())
}

#[tokio::test]
async fn test_query_sends_equality_filter() -> Result<()> {
    let mock = MockServer::default();
    let store = rest_store(&mock).await?;

    let rows = store.query_eq("posts", "authorId", &json!("u1")).await?;
    assert_eq!(rows.len(), 1, "metadata-only rows are skipped");

    let requests = mock.recorded();
    let filter = &requests[0].body["structuredQuery"]["where"]["fieldFilter"];
    assert_eq!(requests[0].body["structuredQuery"]["from"][0]["collectionId"], "posts");
    assert_eq!(filter["field"]["fieldPath"], "authorId");
    assert_eq!(filter["op"], "EQUAL");
    assert_eq!(filter["value"], json!({ "stringValue": "u1" }));
    Ok(())
}

#[tokio::test]
async fn test_delete_batch_commits_named_deletes() -> Result<()> {
    let mock = MockServer::default();
    let store = rest_store(&mock).await?;

    let ids = vec!["p1".to_string(), "p2".to_string()];
    let deleted = store.delete_batch("posts", &ids).await?;
    assert_eq!(deleted, 2);

    let requests = mock.recorded();
    let writes = requests[0].body["writes"].as_array().cloned().unwrap_or_default();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[0]["delete"],
        "projects/chirp-test/databases/(default)/documents/posts/p1"
    );

    // Empty batches never reach the server
    assert_eq!(store.delete_batch("posts", &[]).await?, 0);
    assert_eq!(mock.recorded().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_create_conflict_maps_to_already_exists() -> Result<()> {
    let mock = MockServer::default();
    let store = rest_store(&mock).await?;

    let mut doc = serde_json::Map::new();
    doc.insert("email".to_string(), json!("testuser1-1@test.com"));
    let err = store
        .create("users", "u1", doc)
        .await
        .expect_err("existing document must conflict");
    assert!(matches!(err, StoreError::AlreadyExists { ref id, .. } if id == "u1"));

    let requests = mock.recorded();
    assert!(requests[0].query.contains("documentId=u1"));
    assert_eq!(
        requests[0].body["fields"]["email"],
        json!({ "stringValue": "testuser1-1@test.com" })
    );
    Ok(())
}

#[tokio::test]
async fn test_update_sends_field_mask() -> Result<()> {
    let mock = MockServer::default();
    let store = rest_store(&mock).await?;

    let mut fields = serde_json::Map::new();
    fields.insert("likeCount".to_string(), json!(4));
    let err = store
        .update("posts", "missing", fields)
        .await
        .expect_err("mock has no posts");
    assert!(matches!(err, StoreError::NotFound { .. }));

    let requests = mock.recorded();
    assert_eq!(requests[0].method, Method::PATCH);
    assert!(requests[0].query.contains("updateMask.fieldPaths=likeCount"));
    assert!(requests[0].query.contains("currentDocument.exists=true"));
    Ok(())
}

async fn accounts(uri: Uri, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    match uri.path() {
        "/v1/accounts:signUp" => (
            StatusCode::OK,
            Json(json!({ "idToken": "new-token", "localId": "uid-new", "email": email })),
        ),
        "/v1/accounts:signInWithPassword" if body["password"] == "testpass123" => (
            StatusCode::OK,
            Json(json!({ "idToken": "session-token", "localId": "uid-1", "email": email })),
        ),
        "/v1/accounts:signInWithPassword" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": "OPERATION_NOT_ALLOWED" } })),
        ),
    }
}

#[tokio::test]
async fn test_auth_client_sessions() -> Result<()> {
    let base_url = spawn(Router::new().fallback(accounts)).await?;
    let auth = AuthClient::new(format!("{}/v1", base_url), "web-key");

    let created = auth.sign_up("testuser1-1@test.com", "testpass123").await?;
    assert_eq!(created.uid, "uid-new");
    assert_eq!(created.id_token.as_deref(), Some("new-token"));

    let session = auth.sign_in("testuser1-1@test.com", "testpass123").await?;
    assert_eq!(session.uid, "uid-1");
    assert_eq!(session.email, "testuser1-1@test.com");

    let err = auth
        .sign_in("testuser1-1@test.com", "wrong")
        .await
        .expect_err("wrong password must fail");
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    Ok(())
}
