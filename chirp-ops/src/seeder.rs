//! Synthetic test-data generator.
//!
//! Creates test accounts, follow edges, chirps, story clusters, comments,
//! nested replies, rechirps and topic engagement records. Every write is
//! best-effort: failures are logged and skipped, nothing is rolled back.
//! Emails carry the run's millisecond timestamp so repeated runs never
//! collide.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use uuid::Uuid;

use chirp_types::{Chirp, Collection, Comment, TopicEngagement, User};

use crate::auth::IdentityProvider;
use crate::config::Seed;
use crate::store::{to_document, Document, DocumentStore, StoreError, StoreResult};

/// Topics the seeded population draws interests and clusters from
pub const TOPICS: &[&str] = &[
    "technology",
    "sports",
    "politics",
    "entertainment",
    "science",
    "business",
    "health",
    "gaming",
];

/// Concurrent follow-edge writes fired before pausing
const FOLLOW_BATCH_SIZE: usize = 10;

/// Seeded chirps are spread over this many minutes before now
const CHIRP_WINDOW_MINUTES: i64 = 180;

const CHIRP_TEMPLATES: &[&str] = &[
    "Hot take: {topic} is moving faster than anyone expected this year.",
    "Reading up on {topic} tonight. Any recommendations?",
    "Is it just me or is every conversation about {topic} right now?",
    "Quick thread on what I learned about {topic} this week.",
    "Unpopular opinion about {topic}: the basics still matter most.",
    "Can someone explain the latest {topic} drama to me?",
];

const HEADLINE_TEMPLATES: &[&str] = &[
    "BREAKING: major {topic} announcement expected within the hour.",
    "Developing story: big shake-up in {topic} today.",
    "Just in: {topic} leaders respond to this morning's news.",
];

const CLUSTER_TEMPLATES: &[&str] = &[
    "Did everyone see the {topic} news? This changes things.",
    "Still processing today's {topic} announcement.",
    "The {topic} story this morning is wild. Thoughts?",
    "Following the {topic} news closely. More details soon hopefully.",
];

const COMMENT_TEMPLATES: &[&str] = &[
    "Totally agree with this.",
    "Not sure I buy it, but interesting point.",
    "Great take!",
    "Source?",
    "This is exactly what I was thinking.",
];

const REPLY_TEMPLATES: &[&str] = &[
    "Fair enough, good point.",
    "Replying to say: same.",
    "I think you're missing some context here.",
];

const BIOS: &[&str] = &[
    "Just here for the conversation.",
    "Opinions are my own.",
    "Curious about everything.",
    "Coffee first, chirps second.",
];

const LOCATIONS: &[&str] = &["New York", "London", "Berlin", "Toronto", "Sydney", "Lisbon"];

/// Counts collected during a seeding run
#[derive(Debug, Default)]
pub struct SeedSummary {
    /// Regular test users; the story-cluster author is counted separately
    pub users_created: usize,
    pub main_author_created: bool,
    pub follows_created: usize,
    pub chirps_created: usize,
    pub cluster_chirps_created: usize,
    pub comments_created: usize,
    pub replies_created: usize,
    pub rechirps_created: usize,
    pub engagement_records: usize,
    pub errors: Vec<String>,
}

impl SeedSummary {
    fn record_error(&mut self, error: String) {
        tracing::warn!("{}", error);
        self.errors.push(error);
    }

    /// Display seeding statistics in a formatted way
    pub fn print(&self) {
        println!();
        println!("Seeding Summary");
        println!("===============");
        println!();
        println!("Users created: {}", self.users_created);
        println!(
            "Main author created: {}",
            if self.main_author_created { "yes" } else { "no" }
        );
        println!("Follow edges: {}", self.follows_created);
        println!("Chirps created: {}", self.chirps_created);
        println!("Story cluster chirps: {}", self.cluster_chirps_created);
        println!("Comments created: {}", self.comments_created);
        println!("Nested replies: {}", self.replies_created);
        println!("Rechirps created: {}", self.rechirps_created);
        println!("Topic engagement records: {}", self.engagement_records);

        if !self.errors.is_empty() {
            println!();
            println!("Errors encountered: {}", self.errors.len());
            for (i, error) in self.errors.iter().enumerate() {
                println!("  {}. {}", i + 1, error);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SeededUser {
    id: String,
    handle: String,
    interests: Vec<String>,
}

#[derive(Debug, Clone)]
struct SeededChirp {
    id: String,
    author_id: String,
    content: String,
    topic: String,
    created_at: DateTime<Utc>,
}

pub struct Seeder<'a> {
    store: &'a dyn DocumentStore,
    identity: &'a dyn IdentityProvider,
    plan: Seed,
    run_tag: i64,
}

impl<'a> Seeder<'a> {
    pub fn new(store: &'a dyn DocumentStore, identity: &'a dyn IdentityProvider, plan: Seed) -> Self {
        Self {
            store,
            identity,
            plan,
            run_tag: Utc::now().timestamp_millis(),
        }
    }

    /// Override the timestamp embedded in generated emails and handles
    pub fn with_run_tag(mut self, run_tag: i64) -> Self {
        self.run_tag = run_tag;
        self
    }

    pub fn run_tag(&self) -> i64 {
        self.run_tag
    }

    /// Run every seeding phase in order
    pub async fn run<R: Rng>(&self, rng: &mut R) -> SeedSummary {
        let mut summary = SeedSummary::default();

        let cluster_topics = self.pick_cluster_topics(rng);
        tracing::info!(
            "Seeding run {} with clusters: {}",
            self.run_tag,
            cluster_topics.join(", ")
        );

        let users = self.create_users(rng, &mut summary).await;
        if users.is_empty() {
            summary.record_error("No users were created; skipping content".to_string());
            return summary;
        }

        let main_author = self.create_main_author(&cluster_topics, &mut summary).await;
        summary.main_author_created = main_author.is_some();

        self.create_follows(rng, &users, &mut summary).await;

        let mut chirps = self.create_chirps(rng, &users, &mut summary).await;
        if let Some(author) = &main_author {
            let cluster_chirps = self
                .create_clusters(rng, author, &users, &cluster_topics, &mut summary)
                .await;
            chirps.extend(cluster_chirps);
        }

        let rechirps = self.create_engagement(rng, &users, &chirps, &mut summary).await;
        chirps.extend(rechirps);

        self.write_topic_engagement(&chirps, &mut summary).await;

        summary
    }

    fn pick_cluster_topics<R: Rng>(&self, rng: &mut R) -> Vec<String> {
        let count = (self.plan.topic_clusters as usize).min(TOPICS.len());
        TOPICS
            .choose_multiple(rng, count)
            .map(|t| t.to_string())
            .collect()
    }

    async fn pause(&self) {
        if self.plan.write_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.plan.write_delay_ms)).await;
        }
    }

    /// Create a document, then wait out the write delay; failures are recorded and skipped
    async fn create_doc(
        &self,
        collection: Collection,
        id: &str,
        document: StoreResult<Document>,
        summary: &mut SeedSummary,
    ) -> bool {
        let result = match document {
            Ok(doc) => self.store.create(collection.as_str(), id, doc).await,
            Err(e) => Err(e),
        };
        self.pause().await;

        match result {
            Ok(()) => true,
            Err(e) => {
                summary.record_error(format!("Failed to create {}/{}: {}", collection, id, e));
                false
            }
        }
    }

    async fn update_doc(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
        summary: &mut SeedSummary,
    ) -> bool {
        let result = self.store.update(collection.as_str(), id, fields).await;
        self.pause().await;

        match result {
            Ok(()) => true,
            Err(e) => {
                summary.record_error(format!("Failed to update {}/{}: {}", collection, id, e));
                false
            }
        }
    }

    /// Provision an account and write its profile document
    #[allow(clippy::too_many_arguments)]
    async fn create_user(
        &self,
        email: String,
        handle: String,
        display_name: String,
        interests: Vec<String>,
        bio: Option<String>,
        location: Option<String>,
        reputation: i64,
        summary: &mut SeedSummary,
    ) -> Option<SeededUser> {
        let session = match self.identity.sign_up(&email, &self.plan.password).await {
            Ok(session) => session,
            Err(e) => {
                summary.record_error(format!("Failed to create account {}: {}", email, e));
                return None;
            }
        };

        let user = User {
            id: session.uid.clone(),
            email,
            handle: handle.clone(),
            display_name,
            interests: interests.clone(),
            followers: Vec::new(),
            following: Vec::new(),
            bio,
            location,
            reputation,
            created_at: Utc::now(),
        };

        if !self
            .create_doc(Collection::Users, &user.id, to_document(&user), summary)
            .await
        {
            return None;
        }

        Some(SeededUser {
            id: user.id,
            handle,
            interests,
        })
    }

    async fn create_users<R: Rng>(&self, rng: &mut R, summary: &mut SeedSummary) -> Vec<SeededUser> {
        let mut users = Vec::new();

        for n in 1..=self.plan.users {
            let interest_count = rng.random_range(2..=3);
            let interests: Vec<String> = TOPICS
                .choose_multiple(rng, interest_count)
                .map(|t| t.to_string())
                .collect();
            let bio = BIOS.choose(rng).map(|s| s.to_string());
            let location = LOCATIONS.choose(rng).map(|s| s.to_string());
            let reputation = rng.random_range(0..=100);

            let created = self
                .create_user(
                    format!("testuser{}-{}@test.com", n, self.run_tag),
                    format!("testuser{}_{}", n, self.run_tag),
                    format!("Test User {}", n),
                    interests,
                    bio,
                    location,
                    reputation,
                    summary,
                )
                .await;

            if let Some(user) = created {
                tracing::debug!("Created user {}", user.handle);
                summary.users_created += 1;
                users.push(user);
            }
        }

        tracing::info!("Created {} of {} users", users.len(), self.plan.users);
        users
    }

    /// The account that authors every story-cluster headline
    async fn create_main_author(
        &self,
        cluster_topics: &[String],
        summary: &mut SeedSummary,
    ) -> Option<SeededUser> {
        self.create_user(
            format!("main-author-{}@test.com", self.run_tag),
            format!("main_author_{}", self.run_tag),
            "Main Author".to_string(),
            cluster_topics.to_vec(),
            Some("Breaking news, first.".to_string()),
            None,
            100,
            summary,
        )
        .await
    }

    async fn create_follows<R: Rng>(
        &self,
        rng: &mut R,
        users: &[SeededUser],
        summary: &mut SeedSummary,
    ) {
        let mut following: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut followers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for user in users {
            let others: Vec<&SeededUser> = users.iter().filter(|u| u.id != user.id).collect();
            let wanted = rng
                .random_range(range(self.plan.min_follows_per_user, self.plan.max_follows_per_user))
                as usize;

            for target in others.choose_multiple(rng, wanted.min(others.len())) {
                following
                    .entry(user.id.as_str())
                    .or_default()
                    .insert(target.id.as_str());
                followers
                    .entry(target.id.as_str())
                    .or_default()
                    .insert(user.id.as_str());
            }
        }

        let updates: Vec<(&str, usize, Document)> = users
            .iter()
            .map(|user| {
                let outgoing = following.remove(user.id.as_str()).unwrap_or_default();
                let incoming = followers.remove(user.id.as_str()).unwrap_or_default();
                let edges = outgoing.len();
                let mut fields = Document::new();
                fields.insert("following".to_string(), json!(outgoing));
                fields.insert("followers".to_string(), json!(incoming));
                (user.id.as_str(), edges, fields)
            })
            .collect();

        // Fire each batch without awaiting writes individually, then back off
        for batch in updates.chunks(FOLLOW_BATCH_SIZE) {
            let results = join_all(batch.iter().map(|(id, edges, fields)| async move {
                let result = self
                    .store
                    .update(Collection::Users.as_str(), id, fields.clone())
                    .await;
                (*id, *edges, result)
            }))
            .await;

            for (id, edges, result) in results {
                match result {
                    Ok(()) => summary.follows_created += edges,
                    Err(e) => summary.record_error(format!("Failed to write follows for {}: {}", id, e)),
                }
            }

            if self.plan.batch_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.plan.batch_delay_ms)).await;
            }
        }
    }

    fn new_chirp<R: Rng>(
        &self,
        rng: &mut R,
        author: &SeededUser,
        topic: &str,
        content: String,
        story_cluster_id: Option<String>,
    ) -> Chirp {
        let age = rng.random_range(0..=CHIRP_WINDOW_MINUTES);
        Chirp {
            id: Uuid::new_v4().to_string(),
            author_id: author.id.clone(),
            author_handle: author.handle.clone(),
            content,
            topic: topic.to_string(),
            created_at: Utc::now() - Duration::minutes(age),
            like_count: rng.random_range(0..=50),
            comment_count: 0,
            rechirp_count: 0,
            rechirp_of: None,
            story_cluster_id,
        }
    }

    async fn write_chirp(&self, chirp: &Chirp, summary: &mut SeedSummary) -> Option<SeededChirp> {
        if !self
            .create_doc(Collection::Posts, &chirp.id, to_document(chirp), summary)
            .await
        {
            return None;
        }

        Some(SeededChirp {
            id: chirp.id.clone(),
            author_id: chirp.author_id.clone(),
            content: chirp.content.clone(),
            topic: chirp.topic.clone(),
            created_at: chirp.created_at,
        })
    }

    async fn create_chirps<R: Rng>(
        &self,
        rng: &mut R,
        users: &[SeededUser],
        summary: &mut SeedSummary,
    ) -> Vec<SeededChirp> {
        let mut chirps = Vec::new();

        for user in users {
            let count =
                rng.random_range(range(self.plan.min_posts_per_user, self.plan.max_posts_per_user));

            for _ in 0..count {
                let topic = user
                    .interests
                    .choose(rng)
                    .cloned()
                    .unwrap_or_else(|| TOPICS[0].to_string());
                let content = fill(CHIRP_TEMPLATES.choose(rng), &topic);
                let chirp = self.new_chirp(rng, user, &topic, content, None);

                if let Some(seeded) = self.write_chirp(&chirp, summary).await {
                    summary.chirps_created += 1;
                    chirps.push(seeded);
                }
            }
        }

        tracing::info!("Created {} chirps", chirps.len());
        chirps
    }

    async fn create_clusters<R: Rng>(
        &self,
        rng: &mut R,
        main_author: &SeededUser,
        users: &[SeededUser],
        cluster_topics: &[String],
        summary: &mut SeedSummary,
    ) -> Vec<SeededChirp> {
        let mut chirps = Vec::new();

        for (i, topic) in cluster_topics.iter().enumerate() {
            let cluster_id = format!("cluster-{}-{}", self.run_tag, i + 1);

            let headline = fill(HEADLINE_TEMPLATES.choose(rng), topic);
            let chirp = self.new_chirp(rng, main_author, topic, headline, Some(cluster_id.clone()));
            if let Some(seeded) = self.write_chirp(&chirp, summary).await {
                summary.cluster_chirps_created += 1;
                chirps.push(seeded);
            }

            let wanted = rng.random_range(range(
                self.plan.min_posts_per_cluster,
                self.plan.max_posts_per_cluster,
            )) as usize;
            let participants: Vec<&SeededUser> =
                users.choose_multiple(rng, wanted.min(users.len())).collect();

            for user in participants {
                let content = fill(CLUSTER_TEMPLATES.choose(rng), topic);
                let chirp = self.new_chirp(rng, user, topic, content, Some(cluster_id.clone()));
                if let Some(seeded) = self.write_chirp(&chirp, summary).await {
                    summary.cluster_chirps_created += 1;
                    chirps.push(seeded);
                }
            }
        }

        tracing::info!("Created {} story cluster chirps", chirps.len());
        chirps
    }

    /// Comments, nested replies and rechirps; returns the rechirps created
    async fn create_engagement<R: Rng>(
        &self,
        rng: &mut R,
        users: &[SeededUser],
        chirps: &[SeededChirp],
        summary: &mut SeedSummary,
    ) -> Vec<SeededChirp> {
        let comment_rate = probability(self.plan.comment_rate);
        let reply_rate = probability(self.plan.reply_rate);
        let rechirp_rate = probability(self.plan.rechirp_rate);
        let mut rechirps = Vec::new();

        for chirp in chirps {
            let mut comment_count = 0i64;
            let mut rechirp_count = 0i64;

            if rng.random_bool(comment_rate) {
                let count = rng.random_range(range(1, self.plan.max_comments_per_post));
                for _ in 0..count {
                    let Some(commenter) = users.choose(rng) else { break };
                    let comment = Comment {
                        id: Uuid::new_v4().to_string(),
                        post_id: chirp.id.clone(),
                        parent_comment_id: None,
                        author_id: commenter.id.clone(),
                        content: fill(COMMENT_TEMPLATES.choose(rng), &chirp.topic),
                        created_at: Utc::now(),
                    };
                    if !self
                        .create_doc(Collection::Comments, &comment.id, to_document(&comment), summary)
                        .await
                    {
                        continue;
                    }
                    summary.comments_created += 1;
                    comment_count += 1;

                    if rng.random_bool(reply_rate) {
                        let Some(replier) = users.choose(rng) else { continue };
                        let reply = Comment {
                            id: Uuid::new_v4().to_string(),
                            post_id: chirp.id.clone(),
                            parent_comment_id: Some(comment.id.clone()),
                            author_id: replier.id.clone(),
                            content: fill(REPLY_TEMPLATES.choose(rng), &chirp.topic),
                            created_at: Utc::now(),
                        };
                        if self
                            .create_doc(Collection::Comments, &reply.id, to_document(&reply), summary)
                            .await
                        {
                            summary.replies_created += 1;
                            comment_count += 1;
                        }
                    }
                }
            }

            if rng.random_bool(rechirp_rate) {
                let others: Vec<&SeededUser> =
                    users.iter().filter(|u| u.id != chirp.author_id).collect();
                if let Some(rechirper) = others.choose(rng) {
                    let mut rechirp =
                        self.new_chirp(rng, rechirper, &chirp.topic, chirp.content.clone(), None);
                    rechirp.rechirp_of = Some(chirp.id.clone());
                    rechirp.like_count = 0;

                    if let Some(seeded) = self.write_chirp(&rechirp, summary).await {
                        summary.rechirps_created += 1;
                        rechirp_count += 1;
                        rechirps.push(seeded);
                    }
                }
            }

            if comment_count > 0 || rechirp_count > 0 {
                let mut fields = Document::new();
                fields.insert("commentCount".to_string(), json!(comment_count));
                fields.insert("rechirpCount".to_string(), json!(rechirp_count));
                self.update_doc(Collection::Posts, &chirp.id, fields, summary)
                    .await;
            }
        }

        tracing::info!(
            "Created {} comments, {} replies, {} rechirps",
            summary.comments_created,
            summary.replies_created,
            summary.rechirps_created
        );
        rechirps
    }

    /// One engagement record per topic, created or refreshed
    async fn write_topic_engagement(&self, chirps: &[SeededChirp], summary: &mut SeedSummary) {
        let now = Utc::now();
        let mut by_topic: BTreeMap<&str, Vec<&SeededChirp>> = BTreeMap::new();
        for chirp in chirps {
            by_topic.entry(chirp.topic.as_str()).or_default().push(chirp);
        }

        for (topic, topic_chirps) in by_topic {
            let record = topic_engagement(topic, &topic_chirps, now, self.plan.trending_threshold);
            let document = match to_document(&record) {
                Ok(doc) => doc,
                Err(e) => {
                    summary.record_error(format!("Failed to encode engagement for {}: {}", topic, e));
                    continue;
                }
            };

            // Records are keyed by topic, so earlier runs may already own one
            let result = match self
                .store
                .create(Collection::TopicEngagement.as_str(), topic, document.clone())
                .await
            {
                Err(StoreError::AlreadyExists { .. }) => {
                    self.store
                        .update(Collection::TopicEngagement.as_str(), topic, document)
                        .await
                }
                other => other,
            };
            self.pause().await;

            match result {
                Ok(()) => summary.engagement_records += 1,
                Err(e) => summary.record_error(format!("Failed to write engagement for {}: {}", topic, e)),
            }
        }
    }
}

/// Posts in the last hour define the velocity (posts per hour)
fn topic_engagement(
    topic: &str,
    chirps: &[&SeededChirp],
    now: DateTime<Utc>,
    trending_threshold: f64,
) -> TopicEngagement {
    let within = |window: Duration| {
        chirps
            .iter()
            .filter(|c| now.signed_duration_since(c.created_at) <= window)
            .count() as i64
    };
    let posts_last_hour = within(Duration::hours(1));
    let velocity = posts_last_hour as f64;

    TopicEngagement {
        topic: topic.to_string(),
        posts_last_hour,
        posts_last24h: within(Duration::hours(24)),
        velocity,
        is_trending: velocity >= trending_threshold,
        updated_at: now,
    }
}

/// Clamp a rate into `0.0..=1.0`; NaN never fires
fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Inclusive range that tolerates `max < min`
fn range(min: u32, max: u32) -> RangeInclusive<u32> {
    min..=max.max(min)
}

fn fill(template: Option<&&str>, topic: &str) -> String {
    template
        .map(|t| t.replace("{topic}", topic))
        .unwrap_or_else(|| format!("Thoughts on {}?", topic))
}
