use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Settings, StoreBackend};
use crate::store::Database;

/// An authenticated identity-provider session
#[derive(Debug, Clone)]
pub struct Session {
    pub uid: String,
    pub email: String,
    /// Token for authenticating store requests (absent for local identities)
    pub id_token: Option<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid email or password for {0}")]
    InvalidCredentials(String),

    #[error("Local identity store error: {0}")]
    Local(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Account creation and sign-in, delegated to the managed auth provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    id_token: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// REST client for the identity provider's email/password endpoints
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn password_call(&self, action: &str, email: &str, password: &str) -> AuthResult<Session> {
        let url = format!("{}/accounts:{}", self.base_url, action);
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("status {}: {}", status, body));

            return Err(match code.as_str() {
                "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                    AuthError::InvalidCredentials(email.to_string())
                }
                _ => AuthError::Rejected(code),
            });
        }

        let parsed: PasswordResponse = response.json().await?;
        Ok(Session {
            uid: parsed.local_id,
            email: parsed.email.unwrap_or_else(|| email.to_string()),
            id_token: Some(parsed.id_token),
        })
    }
}

#[async_trait]
impl IdentityProvider for AuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.password_call("signInWithPassword", email, password).await
    }
}

/// Identity accounts kept next to the local document store emulator
#[derive(Clone)]
pub struct LocalIdentity {
    db: Database,
}

impl LocalIdentity {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Number of accounts registered
    pub fn account_count(&self) -> AuthResult<usize> {
        let conn = self.db.connection().map_err(|e| AuthError::Local(e.to_string()))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .map_err(local)?;
        Ok(count as usize)
    }
}

fn local(err: rusqlite::Error) -> AuthError {
    AuthError::Local(err.to_string())
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        let conn = self.db.connection().map_err(|e| AuthError::Local(e.to_string()))?;
        let uid = Uuid::new_v4().to_string();

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO accounts (email, uid, password, created_at) VALUES (?, ?, ?, ?)",
                (email, &uid, password, Utc::now().to_rfc3339()),
            )
            .map_err(local)?;

        if inserted == 0 {
            return Err(AuthError::Rejected("EMAIL_EXISTS".to_string()));
        }

        Ok(Session {
            uid,
            email: email.to_string(),
            id_token: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let conn = self.db.connection().map_err(|e| AuthError::Local(e.to_string()))?;
        let uid: Option<String> = conn
            .query_row(
                "SELECT uid FROM accounts WHERE email = ? AND password = ?",
                (email, password),
                |row| row.get(0),
            )
            .optional()
            .map_err(local)?;

        uid.map(|uid| Session {
            uid,
            email: email.to_string(),
            id_token: None,
        })
        .ok_or_else(|| AuthError::InvalidCredentials(email.to_string()))
    }
}

/// Open the identity provider matching the configured store backend
pub fn open(settings: &Settings) -> Result<Box<dyn IdentityProvider>> {
    match settings.store.backend {
        StoreBackend::Rest => {
            let api_key = crate::config::require(&settings.auth.api_key, "auth.api_key")?;
            Ok(Box::new(AuthClient::new(&settings.auth.base_url, api_key)))
        }
        StoreBackend::Sqlite => {
            let db = Database::new(&settings.store.sqlite_path)?;
            db.initialize()?;
            Ok(Box::new(LocalIdentity::new(db)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_identity() -> LocalIdentity {
        let db = Database::in_memory().expect("database");
        db.initialize().expect("schema");
        LocalIdentity::new(db)
    }

    #[tokio::test]
    async fn test_local_sign_up_then_sign_in() {
        let identity = local_identity();
        let created = identity
            .sign_up("testuser1-1@test.com", "secret")
            .await
            .expect("sign up");

        let session = identity
            .sign_in("testuser1-1@test.com", "secret")
            .await
            .expect("sign in");
        assert_eq!(session.uid, created.uid);
        assert!(session.id_token.is_none());
    }

    #[tokio::test]
    async fn test_local_rejects_wrong_password_and_duplicates() {
        let identity = local_identity();
        identity.sign_up("a@test.com", "secret").await.expect("sign up");

        assert!(matches!(
            identity.sign_in("a@test.com", "wrong").await,
            Err(AuthError::InvalidCredentials(_))
        ));
        assert!(matches!(
            identity.sign_up("a@test.com", "secret").await,
            Err(AuthError::Rejected(_))
        ));
        assert_eq!(identity.account_count().expect("count"), 1);
    }
}
