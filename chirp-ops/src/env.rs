use std::collections::HashMap;
use std::path::Path;

/// Immutable view of the environment a tool runs against.
///
/// Built from a `.env` file overlaid by the process environment, so checks
/// evaluated against it are deterministic for a given snapshot.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Snapshot of the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Read `env_file` (if present) and overlay the process environment on top
    pub fn load(env_file: &Path) -> Self {
        let mut vars = HashMap::new();

        match dotenv::from_path_iter(env_file) {
            Ok(iter) => {
                for item in iter {
                    match item {
                        Ok((key, value)) => {
                            vars.insert(key, value);
                        }
                        Err(e) => {
                            tracing::warn!("Skipping unparsable line in {}: {}", env_file.display(), e);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!("No env file at {}: {}", env_file.display(), e);
            }
        }

        vars.extend(std::env::vars());
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`, treating blank values as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_blank_values_are_unset() {
        let env = EnvSnapshot::from_pairs([("A", "  "), ("B", "value")]);
        assert!(!env.is_set("A"));
        assert_eq!(env.get("B"), Some("value"));
        assert!(!env.is_set("C"));
    }

    #[test]
    fn test_load_reads_env_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "CHIRP_ENV_SNAPSHOT_TEST_KEY=from-file").expect("write env file");

        let env = EnvSnapshot::load(file.path());
        assert_eq!(env.get("CHIRP_ENV_SNAPSHOT_TEST_KEY"), Some("from-file"));
    }

    #[test]
    fn test_load_missing_file_is_empty_overlay() {
        let env = EnvSnapshot::load(Path::new("/nonexistent/chirp/.env"));
        assert!(!env.is_set("CHIRP_ENV_SNAPSHOT_MISSING_KEY"));
    }
}
