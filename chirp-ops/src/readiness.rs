//! Production-readiness checks for a Chirp deployment.
//!
//! Every check is a final, one-shot determination: the same environment
//! snapshot and file tree always produce the same report.

use std::path::Path;

use crate::env::EnvSnapshot;
use crate::report::{Outcome, Report};

/// Minimum delay between automated bot posts
pub const MIN_POSTER_INTERVAL_MS: u64 = 15_000;

/// Minimum delay between news API fetches
pub const MIN_NEWS_FETCH_INTERVAL_MS: u64 = 60_000;

/// How a failed predicate is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckKind {
    /// Variable is set to a non-blank value
    EnvPresent { var: &'static str },
    /// Variable parses as an integer no smaller than `min`
    EnvAtLeast { var: &'static str, min: u64 },
    /// Variable parses as a number greater than zero
    EnvPositive { var: &'static str },
    /// Path exists below the project root
    FileExists { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: String,
    pub kind: CheckKind,
    pub severity: Severity,
}

impl Check {
    fn new(name: impl Into<String>, kind: CheckKind, severity: Severity) -> Self {
        Self {
            name: name.into(),
            kind,
            severity,
        }
    }

    /// Evaluate this check against an environment snapshot and project root
    pub fn evaluate(&self, env: &EnvSnapshot, root: &Path) -> Outcome {
        match &self.kind {
            CheckKind::EnvPresent { var } => {
                if env.is_set(var) {
                    Outcome::Pass
                } else {
                    self.failed(format!("{} is not set", var))
                }
            }
            CheckKind::EnvAtLeast { var, min } => match env.get(var) {
                // An unset interval falls back to the application default
                None => Outcome::Warning(format!("{} is not set; the default applies", var)),
                Some(raw) => match raw.parse::<u64>() {
                    Ok(value) if value >= *min => Outcome::Pass,
                    Ok(value) => self.failed(format!("{} is {} (minimum {})", var, value, min)),
                    Err(_) => self.failed(format!("{} is not a whole number: {:?}", var, raw)),
                },
            },
            CheckKind::EnvPositive { var } => match env.get(var).map(str::parse::<f64>) {
                Some(Ok(value)) if value > 0.0 => Outcome::Pass,
                Some(Ok(value)) => self.failed(format!("{} must be positive, got {}", var, value)),
                Some(Err(_)) => self.failed(format!("{} is not a number", var)),
                None => self.failed(format!("{} is not set", var)),
            },
            CheckKind::FileExists { path } => {
                if root.join(path).exists() {
                    Outcome::Pass
                } else {
                    self.failed(format!("{} not found", path))
                }
            }
        }
    }

    fn failed(&self, message: String) -> Outcome {
        match self.severity {
            Severity::Warning => Outcome::Warning(message),
            Severity::Failure => Outcome::Failure(message),
        }
    }
}

/// The fixed environment checks every deployment must satisfy
pub fn env_checks() -> Vec<Check> {
    use CheckKind::*;
    use Severity::*;

    vec![
        Check::new("Firebase API key", EnvPresent { var: "VITE_FIREBASE_API_KEY" }, Failure),
        Check::new("Firebase project id", EnvPresent { var: "VITE_FIREBASE_PROJECT_ID" }, Failure),
        Check::new("Firebase auth domain", EnvPresent { var: "VITE_FIREBASE_AUTH_DOMAIN" }, Failure),
        Check::new("News API key", EnvPresent { var: "VITE_NEWS_API_KEY" }, Failure),
        Check::new("Gemini API key", EnvPresent { var: "VITE_GEMINI_API_KEY" }, Failure),
        Check::new("OpenAI fallback key", EnvPresent { var: "VITE_OPENAI_API_KEY" }, Warning),
        Check::new(
            "poster interval is >= 15s",
            EnvAtLeast {
                var: "VITE_BOT_POSTER_INTERVAL_MS",
                min: MIN_POSTER_INTERVAL_MS,
            },
            Failure,
        ),
        Check::new(
            "news fetch interval is >= 60s",
            EnvAtLeast {
                var: "VITE_NEWS_FETCH_INTERVAL_MS",
                min: MIN_NEWS_FETCH_INTERVAL_MS,
            },
            Warning,
        ),
        Check::new(
            "trending threshold is positive",
            EnvPositive { var: "VITE_TRENDING_VELOCITY_THRESHOLD" },
            Warning,
        ),
    ]
}

/// File checks: every required file must exist, and a `.env` file is expected
pub fn file_checks(required_files: &[String]) -> Vec<Check> {
    let mut checks: Vec<Check> = required_files
        .iter()
        .map(|path| {
            Check::new(
                format!("{} exists", path),
                CheckKind::FileExists { path: path.clone() },
                Severity::Failure,
            )
        })
        .collect();

    checks.push(Check::new(
        ".env file exists",
        CheckKind::FileExists {
            path: ".env".to_string(),
        },
        Severity::Warning,
    ));
    checks
}

/// Run every readiness check and collect the results
pub fn run_readiness(env: &EnvSnapshot, root: &Path, required_files: &[String]) -> Report {
    let mut report = Report::new();

    for check in env_checks().iter().chain(file_checks(required_files).iter()) {
        let outcome = check.evaluate(env, root);
        tracing::debug!("{}: {:?}", check.name, outcome);
        report.record(check.name.clone(), outcome);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn complete_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("VITE_FIREBASE_API_KEY", "key"),
            ("VITE_FIREBASE_PROJECT_ID", "chirp"),
            ("VITE_FIREBASE_AUTH_DOMAIN", "chirp.firebaseapp.com"),
            ("VITE_NEWS_API_KEY", "news"),
            ("VITE_GEMINI_API_KEY", "gemini"),
            ("VITE_OPENAI_API_KEY", "openai"),
            ("VITE_BOT_POSTER_INTERVAL_MS", "30000"),
            ("VITE_NEWS_FETCH_INTERVAL_MS", "300000"),
            ("VITE_TRENDING_VELOCITY_THRESHOLD", "5"),
        ]
    }

    fn env_with(overrides: &[(&'static str, &'static str)], removed: &[&str]) -> EnvSnapshot {
        let mut pairs = complete_env();
        pairs.retain(|(k, _)| !removed.contains(k) && !overrides.iter().any(|(o, _)| o == k));
        pairs.extend_from_slice(overrides);
        EnvSnapshot::from_pairs(pairs)
    }

    fn project_root(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        for file in files {
            let path = dir.path().join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create dirs");
            }
            fs::write(&path, "").expect("write file");
        }
        dir
    }

    fn required() -> Vec<String> {
        vec!["package.json".to_string(), "src/services/newsService.js".to_string()]
    }

    #[test]
    fn test_complete_snapshot_passes() {
        let root = project_root(&["package.json", "src/services/newsService.js", ".env"]);
        let report = run_readiness(&env_with(&[], &[]), root.path(), &required());

        assert_eq!(report.failures(), 0);
        assert_eq!(report.warnings(), 0);
        assert_eq!(report.exit_status(), 0);
    }

    #[test]
    fn test_missing_news_key_fails() {
        let root = project_root(&["package.json", "src/services/newsService.js", ".env"]);
        let report = run_readiness(&env_with(&[], &["VITE_NEWS_API_KEY"]), root.path(), &required());

        assert!(report.failures() >= 1);
        assert_eq!(report.exit_status(), 1);
        assert!(matches!(
            report.get("News API key").map(|r| &r.outcome),
            Some(Outcome::Failure(_))
        ));
    }

    #[test]
    fn test_short_poster_interval_fails() {
        let root = project_root(&["package.json", "src/services/newsService.js", ".env"]);
        let env = env_with(&[("VITE_BOT_POSTER_INTERVAL_MS", "5000")], &[]);
        let report = run_readiness(&env, root.path(), &required());

        assert!(matches!(
            report.get("poster interval is >= 15s").map(|r| &r.outcome),
            Some(Outcome::Failure(_))
        ));
        assert_eq!(report.exit_status(), 1);
    }

    #[test]
    fn test_unset_interval_and_optional_key_only_warn() {
        let root = project_root(&["package.json", "src/services/newsService.js"]);
        let env = env_with(&[], &["VITE_BOT_POSTER_INTERVAL_MS", "VITE_OPENAI_API_KEY"]);
        let report = run_readiness(&env, root.path(), &required());

        // poster interval, OpenAI key and .env file
        assert_eq!(report.warnings(), 3);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.exit_status(), 0);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let root = project_root(&["package.json", ".env"]);
        let report = run_readiness(&env_with(&[], &[]), root.path(), &required());

        assert_eq!(report.failures(), 1);
        assert!(matches!(
            report.get("src/services/newsService.js exists").map(|r| &r.outcome),
            Some(Outcome::Failure(_))
        ));
    }

    #[test]
    fn test_non_numeric_values() {
        let root = project_root(&["package.json", "src/services/newsService.js", ".env"]);
        let env = env_with(
            &[
                ("VITE_BOT_POSTER_INTERVAL_MS", "fast"),
                ("VITE_TRENDING_VELOCITY_THRESHOLD", "-1"),
            ],
            &[],
        );
        let report = run_readiness(&env, root.path(), &required());

        assert_eq!(report.failures(), 1);
        assert_eq!(report.warnings(), 1);
    }

    #[test]
    fn test_same_snapshot_same_report() {
        let root = project_root(&["package.json"]);
        let env = env_with(&[("VITE_BOT_POSTER_INTERVAL_MS", "5000")], &["VITE_GEMINI_API_KEY"]);

        let first = run_readiness(&env, root.path(), &required());
        let second = run_readiness(&env, root.path(), &required());
        assert_eq!(first.results(), second.results());
    }
}
