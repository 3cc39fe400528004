//! Textual smoke tests over the web app's source files.
//!
//! Each assertion only checks that a file contains a literal snippet; the
//! code under test is never executed.

use std::fs;
use std::path::Path;

use crate::config::SourceAssertionSetting;
use crate::report::Report;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceAssertion {
    pub file: String,
    pub description: String,
    pub needle: String,
}

impl SourceAssertion {
    pub fn new(
        file: impl Into<String>,
        description: impl Into<String>,
        needle: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            description: description.into(),
            needle: needle.into(),
        }
    }

    fn label(&self) -> String {
        format!("{}: {}", self.file, self.description)
    }
}

impl From<&SourceAssertionSetting> for SourceAssertion {
    fn from(setting: &SourceAssertionSetting) -> Self {
        Self::new(&setting.file, &setting.description, &setting.needle)
    }
}

/// Assertions used when the settings file does not provide any
pub fn default_assertions() -> Vec<SourceAssertion> {
    vec![
        SourceAssertion::new(
            "src/services/newsService.js",
            "imports generateNewsItems",
            "generateNewsItems",
        ),
        SourceAssertion::new(
            "src/services/newsService.js",
            "calls clusterStories",
            "clusterStories(",
        ),
        SourceAssertion::new(
            "src/services/newsService.js",
            "stores a dedup signature",
            "dedupSignature",
        ),
        SourceAssertion::new(
            "src/services/topicService.js",
            "calls calculateTopicVelocity",
            "calculateTopicVelocity(",
        ),
        SourceAssertion::new(
            "src/services/botService.js",
            "reads VITE_BOT_POSTER_INTERVAL_MS",
            "VITE_BOT_POSTER_INTERVAL_MS",
        ),
    ]
}

/// The configured assertions, or the defaults when none are configured
pub fn configured_assertions(settings: &[SourceAssertionSetting]) -> Vec<SourceAssertion> {
    if settings.is_empty() {
        default_assertions()
    } else {
        settings.iter().map(SourceAssertion::from).collect()
    }
}

/// Check each assertion against files below `root`
pub fn run_assertions(root: &Path, assertions: &[SourceAssertion]) -> Report {
    let mut report = Report::new();

    for assertion in assertions {
        let path = root.join(&assertion.file);
        match fs::read_to_string(&path) {
            Ok(contents) if contents.contains(&assertion.needle) => report.pass(assertion.label()),
            Ok(_) => report.fail(
                assertion.label(),
                format!("{:?} not found", assertion.needle),
            ),
            Err(e) => report.fail(
                assertion.label(),
                format!("could not read {}: {}", path.display(), e),
            ),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_fail_and_unreadable() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(
            dir.path().join("news.js"),
            "import { generateNewsItems } from './ai';\n",
        )
        .expect("write");

        let assertions = vec![
            SourceAssertion::new("news.js", "imports generateNewsItems", "generateNewsItems"),
            SourceAssertion::new("news.js", "calls clusterStories", "clusterStories("),
            SourceAssertion::new("missing.js", "exists", "anything"),
        ];
        let report = run_assertions(dir.path(), &assertions);

        assert_eq!(report.passed(), 1);
        assert_eq!(report.failures(), 2);
        assert_eq!(report.exit_status(), 1);
    }

    #[test]
    fn test_configured_assertions_replace_defaults() {
        assert_eq!(configured_assertions(&[]), default_assertions());

        let custom = vec![SourceAssertionSetting {
            file: "a.js".to_string(),
            description: "calls b".to_string(),
            needle: "b(".to_string(),
        }];
        let assertions = configured_assertions(&custom);
        assert_eq!(assertions, vec![SourceAssertion::new("a.js", "calls b", "b(")]);
    }
}
