//! Removal of seeded test data.
//!
//! Test owners are recognised purely by their email. Their chirps, comments
//! and personalized news items are deleted in bounded batches before the
//! owner document itself. Identity-provider accounts are left untouched:
//! removing them needs admin credentials this tool never holds.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;

use chirp_types::Collection;

use crate::auth::{AuthError, IdentityProvider};
use crate::store::{DocumentStore, StoredDocument, MAX_BATCH_WRITES};

/// Token that must be passed to actually delete anything
pub const CONFIRM_TOKEN: &str = "confirm";

/// Email patterns that mark an account as test data
pub const TEST_EMAIL_PATTERNS: &[&str] = &[
    r"testuser\d+-",
    r"main-author-",
    r"@test\.com$",
    r"test-news-",
    r"test-personalized-news-",
    r"test-value-",
    r"test-dedup-",
];

static TEST_EMAIL_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    TEST_EMAIL_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("Failed to compile test email pattern"))
        .collect()
});

/// Whether an email belongs to a generated test account
///
/// # Examples
///
/// ```
/// use chirp_ops::cleanup::is_test_user_email;
/// assert!(is_test_user_email(Some("testuser3-1712345678@example.org")));
/// assert!(is_test_user_email(Some("someone@test.com")));
/// assert!(!is_test_user_email(Some("jane@example.com")));
/// assert!(!is_test_user_email(None));
/// ```
pub fn is_test_user_email(email: Option<&str>) -> bool {
    match email {
        Some(email) if !email.is_empty() => TEST_EMAIL_REGEXES.iter().any(|re| re.is_match(email)),
        _ => false,
    }
}

/// Statistics collected during a cleanup run
#[derive(Debug, Default)]
pub struct CleanupSummary {
    pub users_matched: usize,
    pub users_deleted: usize,
    pub chirps_deleted: usize,
    pub comments_deleted: usize,
    pub news_items_deleted: usize,
    pub errors: Vec<String>,
}

impl CleanupSummary {
    fn record_error(&mut self, error: String) {
        tracing::error!("{}", error);
        self.errors.push(error);
    }

    /// Display cleanup statistics, always followed by the identity-account warning
    pub fn print(&self) {
        println!();
        println!("Cleanup Summary");
        println!("===============");
        println!();
        println!("Test users matched: {}", self.users_matched);
        println!("User documents deleted: {}", self.users_deleted);
        println!("Chirps deleted: {}", self.chirps_deleted);
        println!("Comments deleted: {}", self.comments_deleted);
        println!("News items deleted: {}", self.news_items_deleted);

        if !self.errors.is_empty() {
            println!();
            println!("Errors encountered: {}", self.errors.len());
            for (i, error) in self.errors.iter().enumerate() {
                println!("  {}. {}", i + 1, error);
            }
        }

        println!();
        println!("⚠ Identity-provider accounts were NOT deleted.");
        println!("  Remove them with an admin-privileged tool or manually from the");
        println!("  authentication console.");
    }
}

/// Preconditions checked before anything is signed in or deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupGate {
    /// The confirm token was not given; nothing happens
    Unconfirmed,
    MissingEmail,
    /// The sign-in email does not belong to a test account
    NotTestEmail(String),
    /// No test-account password is configured for the email
    MissingPassword(String),
    Proceed { email: String, password: String },
}

impl CleanupGate {
    pub fn evaluate(confirm: Option<&str>, email: Option<&str>, password: Option<&str>) -> Self {
        if confirm != Some(CONFIRM_TOKEN) {
            return CleanupGate::Unconfirmed;
        }
        let Some(email) = email.filter(|e| !e.trim().is_empty()) else {
            return CleanupGate::MissingEmail;
        };
        if !is_test_user_email(Some(email)) {
            return CleanupGate::NotTestEmail(email.to_string());
        }
        match password.filter(|p| !p.is_empty()) {
            Some(password) => CleanupGate::Proceed {
                email: email.to_string(),
                password: password.to_string(),
            },
            None => CleanupGate::MissingPassword(email.to_string()),
        }
    }

    /// Process exit status for a run stopped at this gate
    pub fn exit_status(&self) -> u8 {
        match self {
            CleanupGate::Unconfirmed | CleanupGate::Proceed { .. } => 0,
            _ => 1,
        }
    }
}

/// Outcome of a gated cleanup
#[derive(Debug)]
pub enum CleanupRun {
    Skipped(CleanupGate),
    SignInFailed(AuthError),
    Completed(CleanupSummary),
}

impl CleanupRun {
    pub fn exit_status(&self) -> u8 {
        match self {
            CleanupRun::Skipped(gate) => gate.exit_status(),
            CleanupRun::SignInFailed(_) => 1,
            CleanupRun::Completed(summary) if summary.errors.is_empty() => 0,
            CleanupRun::Completed(_) => 1,
        }
    }
}

/// Sign in as the gated test account, then clean up.
///
/// `open_store` receives the session token and is only called once sign-in
/// succeeded, so a refused gate never touches the store.
pub async fn run_gated<F>(
    gate: CleanupGate,
    identity: &dyn IdentityProvider,
    open_store: F,
    batch_size: usize,
) -> anyhow::Result<CleanupRun>
where
    F: FnOnce(Option<String>) -> anyhow::Result<Box<dyn DocumentStore>>,
{
    let (email, password) = match gate {
        CleanupGate::Proceed { email, password } => (email, password),
        refused => return Ok(CleanupRun::Skipped(refused)),
    };

    let session = match identity.sign_in(&email, &password).await {
        Ok(session) => session,
        Err(e) => return Ok(CleanupRun::SignInFailed(e)),
    };
    tracing::info!("Signed in as {}", session.email);

    let store = open_store(session.id_token)?;
    Ok(CleanupRun::Completed(run_cleanup(store.as_ref(), batch_size).await))
}

/// Delete every test user and their dependent content
pub async fn run_cleanup(store: &dyn DocumentStore, batch_size: usize) -> CleanupSummary {
    let batch_size = batch_size.clamp(1, MAX_BATCH_WRITES);
    let mut summary = CleanupSummary::default();

    let users = match store.list(Collection::Users.as_str()).await {
        Ok(users) => users,
        Err(e) => {
            summary.record_error(format!("Failed to list users: {}", e));
            return summary;
        }
    };

    let test_users: Vec<StoredDocument> = users
        .into_iter()
        .filter(|u| is_test_user_email(u.field_str("email")))
        .collect();
    summary.users_matched = test_users.len();
    tracing::info!("Matched {} test users", test_users.len());

    for user in &test_users {
        let email = user.field_str("email").unwrap_or_default();
        tracing::info!("Cleaning up {} ({})", email, user.id);
        cleanup_user(store, &user.id, batch_size, &mut summary).await;
    }

    summary
}

async fn cleanup_user(
    store: &dyn DocumentStore,
    user_id: &str,
    batch_size: usize,
    summary: &mut CleanupSummary,
) {
    let chirp_ids = query_ids(store, Collection::Posts, "authorId", user_id, summary).await;

    // Comments the user wrote plus comments left on the user's chirps
    let mut comment_ids: BTreeSet<String> =
        query_ids(store, Collection::Comments, "authorId", user_id, summary)
            .await
            .into_iter()
            .collect();
    for chirp_id in &chirp_ids {
        comment_ids.extend(query_ids(store, Collection::Comments, "postId", chirp_id, summary).await);
    }
    let comment_ids: Vec<String> = comment_ids.into_iter().collect();

    let news_ids = query_ids(store, Collection::NewsItems, "userId", user_id, summary).await;

    summary.comments_deleted +=
        delete_in_batches(store, Collection::Comments, &comment_ids, batch_size, summary).await;
    summary.chirps_deleted +=
        delete_in_batches(store, Collection::Posts, &chirp_ids, batch_size, summary).await;
    summary.news_items_deleted +=
        delete_in_batches(store, Collection::NewsItems, &news_ids, batch_size, summary).await;

    let owner = [user_id.to_string()];
    summary.users_deleted +=
        delete_in_batches(store, Collection::Users, &owner, batch_size, summary).await;
}

async fn query_ids(
    store: &dyn DocumentStore,
    collection: Collection,
    field: &str,
    value: &str,
    summary: &mut CleanupSummary,
) -> Vec<String> {
    match store.query_eq(collection.as_str(), field, &json!(value)).await {
        Ok(docs) => docs.into_iter().map(|d| d.id).collect(),
        Err(e) => {
            summary.record_error(format!(
                "Failed to query {} where {} == {}: {}",
                collection, field, value, e
            ));
            Vec::new()
        }
    }
}

/// Delete ids in chunks; a failed chunk is recorded and the rest continue
async fn delete_in_batches(
    store: &dyn DocumentStore,
    collection: Collection,
    ids: &[String],
    batch_size: usize,
    summary: &mut CleanupSummary,
) -> usize {
    let mut deleted = 0;

    for chunk in ids.chunks(batch_size) {
        match store.delete_batch(collection.as_str(), chunk).await {
            Ok(count) => deleted += count,
            Err(e) => summary.record_error(format!(
                "Failed to delete {} {} documents: {}",
                chunk.len(),
                collection,
                e
            )),
        }
    }

    deleted
}
