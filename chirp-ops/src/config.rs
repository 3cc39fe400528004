use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::env::EnvSnapshot;

/// Settings file looked up in the working directory
pub const SETTINGS_FILE: &str = "chirp-ops.toml";

/// Environment variables that override individual settings
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("CHIRP_STORE_BACKEND", "store.backend"),
    ("CHIRP_STORE_URL", "store.base_url"),
    ("CHIRP_SQLITE_PATH", "store.sqlite_path"),
    ("VITE_FIREBASE_PROJECT_ID", "store.project_id"),
    ("VITE_FIREBASE_API_KEY", "store.api_key"),
    ("CHIRP_AUTH_URL", "auth.base_url"),
    ("VITE_FIREBASE_API_KEY", "auth.api_key"),
    ("CHIRP_GENERATIVE_URL", "probes.generative_base_url"),
    ("VITE_GEMINI_API_KEY", "probes.generative_api_key"),
    ("CHIRP_HEALTH_URL", "probes.health_url"),
    ("TEST_USER_PASSWORD", "cleanup.password"),
    ("TEST_USER_PASSWORD", "seed.password"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Rest,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Store {
    pub backend: StoreBackend,
    pub base_url: String,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub sqlite_path: String,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Rest,
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: None,
            api_key: None,
            sqlite_path: "chirp-local.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Probes {
    pub generative_base_url: String,
    pub generative_api_key: Option<String>,
    /// Candidates in `version/model` form, tried in order
    pub model_candidates: Vec<String>,
    pub health_url: String,
    pub required_secret: String,
}

impl Default for Probes {
    fn default() -> Self {
        Self {
            generative_base_url: "https://generativelanguage.googleapis.com".to_string(),
            generative_api_key: None,
            model_candidates: [
                "v1beta/gemini-2.0-flash",
                "v1beta/gemini-1.5-flash",
                "v1/gemini-1.5-flash",
                "v1beta/gemini-1.5-pro",
                "v1/gemini-pro",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            health_url: "http://localhost:3000/api/health".to_string(),
            required_secret: "NEWS_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub users: u32,
    pub topic_clusters: u32,
    pub min_posts_per_user: u32,
    pub max_posts_per_user: u32,
    pub min_posts_per_cluster: u32,
    pub max_posts_per_cluster: u32,
    pub comment_rate: f64,
    pub max_comments_per_post: u32,
    pub reply_rate: f64,
    pub rechirp_rate: f64,
    pub min_follows_per_user: u32,
    pub max_follows_per_user: u32,
    pub write_delay_ms: u64,
    pub batch_delay_ms: u64,
    pub trending_threshold: f64,
    pub password: String,
}

impl Default for Seed {
    fn default() -> Self {
        Self {
            users: 10,
            topic_clusters: 4,
            min_posts_per_user: 3,
            max_posts_per_user: 5,
            min_posts_per_cluster: 3,
            max_posts_per_cluster: 6,
            comment_rate: 0.4,
            max_comments_per_post: 3,
            reply_rate: 0.3,
            rechirp_rate: 0.15,
            min_follows_per_user: 2,
            max_follows_per_user: 5,
            write_delay_ms: 150,
            batch_delay_ms: 1000,
            trending_threshold: 5.0,
            password: "testpass123".to_string(),
        }
    }
}

impl Seed {
    /// Reject probabilities outside `0.0..=1.0` (NaN included) and a non-finite threshold
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("seed.comment_rate", self.comment_rate),
            ("seed.reply_rate", self.reply_rate),
            ("seed.rechirp_rate", self.rechirp_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Message(format!(
                    "{} must be between 0 and 1, got {}",
                    name, rate
                )));
            }
        }
        if !self.trending_threshold.is_finite() {
            return Err(ConfigError::Message(format!(
                "seed.trending_threshold must be finite, got {}",
                self.trending_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cleanup {
    pub batch_size: usize,
    pub password: Option<String>,
}

impl Default for Cleanup {
    fn default() -> Self {
        Self {
            batch_size: 400,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Readiness {
    /// Source files the deployed app cannot run without, relative to the project root
    pub required_files: Vec<String>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            required_files: [
                "package.json",
                "src/config/firebase.js",
                "src/services/newsService.js",
                "src/services/botService.js",
                "src/services/topicService.js",
                "firestore.rules",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceAssertionSetting {
    pub file: String,
    pub description: String,
    pub needle: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: Store,
    pub auth: Auth,
    pub probes: Probes,
    pub seed: Seed,
    pub cleanup: Cleanup,
    pub readiness: Readiness,
    /// Replaces the built-in source assertions when non-empty
    pub assertions: Vec<SourceAssertionSetting>,
}

impl Settings {
    /// Load settings from `chirp-ops.toml` (if present) and the process environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(&EnvSnapshot::from_process())
    }

    /// Load settings from `chirp-ops.toml` (if present) and the given environment
    pub fn load(env: &EnvSnapshot) -> Result<Self, ConfigError> {
        let file = PathBuf::from(SETTINGS_FILE);
        Self::from_sources(file.exists().then_some(file.as_path()), env)
    }

    /// Build settings from an optional TOML file overlaid by environment overrides
    pub fn from_sources(file: Option<&Path>, env: &EnvSnapshot) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        // Environment variables have the highest priority
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env.get(var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.seed.validate()?;
        Ok(settings)
    }
}

/// Return a required optional setting or a `NotFound` error naming it
pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::NotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::from_sources(None, &EnvSnapshot::default())
            .expect("defaults should deserialize");

        assert_eq!(settings.store.backend, StoreBackend::Rest);
        assert_eq!(settings.cleanup.batch_size, 400);
        assert_eq!(settings.probes.model_candidates.len(), 5);
        assert_eq!(settings.seed.min_posts_per_user, 3);
        assert!(settings.assertions.is_empty());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "[store]\nbackend = \"sqlite\"\nproject_id = \"from-file\"\n\n[seed]\nusers = 3"
        )
        .expect("write settings");

        let env = EnvSnapshot::from_pairs([("VITE_FIREBASE_PROJECT_ID", "from-env")]);
        let settings = Settings::from_sources(Some(file.path()), &env).expect("settings load");

        assert_eq!(settings.store.backend, StoreBackend::Sqlite);
        assert_eq!(settings.store.project_id.as_deref(), Some("from-env"));
        assert_eq!(settings.seed.users, 3);
        // untouched fields in a partially specified section keep their defaults
        assert_eq!(settings.seed.max_posts_per_user, 5);
    }

    #[test]
    fn test_rejects_invalid_seed_rates() {
        for body in [
            "[seed]\ncomment_rate = nan",
            "[seed]\nreply_rate = 1.5",
            "[seed]\nrechirp_rate = -0.1",
            "[seed]\ntrending_threshold = inf",
        ] {
            let mut file = tempfile::Builder::new()
                .suffix(".toml")
                .tempfile()
                .expect("temp file");
            writeln!(file, "{}", body).expect("write settings");

            let result = Settings::from_sources(Some(file.path()), &EnvSnapshot::default());
            assert!(result.is_err(), "{:?} should be rejected", body);
        }
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require(&None, "store.project_id").is_err());
        assert!(require(&Some("  ".to_string()), "store.project_id").is_err());
        assert_eq!(
            require(&Some("chirp".to_string()), "store.project_id").ok(),
            Some("chirp")
        );
    }
}
