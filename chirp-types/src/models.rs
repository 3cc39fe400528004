use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// A user profile document in the `users` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub handle: String,
    pub display_name: String,
    /// Topics the user selected during onboarding
    #[serde(default)]
    pub interests: Vec<String>,
    /// Identifiers of users following this user
    #[serde(default)]
    pub followers: Vec<String>,
    /// Identifiers of users this user follows
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub reputation: i64,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// A short post ("chirp") in the `posts` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chirp {
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub content: String,
    pub topic: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub rechirp_count: i64,
    /// Original chirp when this document is a rechirp
    #[serde(default)]
    pub rechirp_of: Option<String>,
    /// Story cluster this chirp was grouped into
    #[serde(default)]
    pub story_cluster_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    /// Parent comment for nested replies (None for top-level comments)
    #[serde(default)]
    pub parent_comment_id: Option<String>,
    pub author_id: String,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// Rolling counts used to estimate how fast a topic is being posted about
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicEngagement {
    pub topic: String,
    pub posts_last_hour: i64,
    pub posts_last24h: i64,
    /// Approximate posts per hour
    pub velocity: f64,
    pub is_trending: bool,
    #[serde(with = "datetime_format")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    /// Owning user for personalized items
    #[serde(default)]
    pub user_id: Option<String>,
    pub source: String,
    pub title: String,
    pub dedup_signature: String,
    #[serde(default)]
    pub contributing_post_ids: Vec<String>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// Body of the deployed application's health endpoint.
///
/// Secret visibility flags (`newsApiKeyConfigured` and friends) are read
/// from the raw body by name, so only the fixed fields live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub environment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chirp_defaults_missing_counters() {
        let chirp: Chirp = serde_json::from_value(json!({
            "id": "c1",
            "authorId": "u1",
            "authorHandle": "@alice",
            "content": "hello",
            "topic": "technology",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .expect("chirp should deserialize");

        assert_eq!(chirp.like_count, 0);
        assert_eq!(chirp.rechirp_of, None);
        assert_eq!(chirp.story_cluster_id, None);
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let user = User {
            id: "u1".to_string(),
            email: "testuser1-1@test.com".to_string(),
            handle: "testuser1".to_string(),
            display_name: "Test User 1".to_string(),
            interests: vec!["sports".to_string()],
            followers: vec![],
            following: vec!["u2".to_string()],
            bio: None,
            location: Some("Lisbon".to_string()),
            reputation: 10,
            created_at: "2024-01-01T00:00:00Z".parse().expect("valid timestamp"),
        };

        let value = serde_json::to_value(&user).expect("user should serialize");
        assert_eq!(value["displayName"], "Test User 1");
        assert_eq!(value["following"][0], "u2");
        assert_eq!(value["createdAt"], "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_health_report_ignores_unknown_flags() {
        let report: HealthReport = serde_json::from_value(json!({
            "status": "ok",
            "newsApiKeyConfigured": true
        }))
        .expect("report should parse");
        assert_eq!(report.status, "ok");
        assert!(report.environment.is_none());
    }
}
