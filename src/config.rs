//! Credentials and knobs for both flows.
//!
//! The scrape flow reads a JSON file (`config.json` by default):
//! ```json
//! { "username": "me", "password": "secret",
//!   "swarm_url": "http://perforce.alt9.io",
//!   "loader": { "stable_threshold": 5, "settle_delay_ms": 2000, "max_polls": 500 } }
//! ```
//! The API flow reads `SWARM_URL`, `USERNAME` and `PASSWORD` from the
//! environment, optionally seeded from a `.env` file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::loader::{
    LoaderOptions, DEFAULT_MAX_POLLS, DEFAULT_SETTLE_DELAY, DEFAULT_STABLE_THRESHOLD,
};
use crate::{Error, Result};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_SWARM_URL: &str = "http://perforce.alt9.io";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    pub swarm_url: String,
    pub credentials: Credentials,
    pub loader: LoaderOptions,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    username: Option<String>,
    password: Option<String>,
    swarm_url: Option<String>,
    #[serde(default)]
    loader: RawLoader,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawLoader {
    stable_threshold: usize,
    settle_delay_ms: u64,
    /// 0 disables the cap.
    max_polls: usize,
}

impl Default for RawLoader {
    fn default() -> Self {
        Self {
            stable_threshold: DEFAULT_STABLE_THRESHOLD,
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl From<RawLoader> for LoaderOptions {
    fn from(raw: RawLoader) -> Self {
        LoaderOptions {
            stable_threshold: raw.stable_threshold.max(1),
            settle_delay: Duration::from_millis(raw.settle_delay_ms),
            max_polls: (raw.max_polls > 0).then_some(raw.max_polls),
        }
    }
}

impl ScrapeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigMissing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content).map_err(Error::ConfigParse)?;
        Ok(Self {
            swarm_url: non_empty(raw.swarm_url)
                .unwrap_or_else(|| DEFAULT_SWARM_URL.to_string()),
            credentials: Credentials {
                username: non_empty(raw.username).ok_or(Error::ConfigKey("username"))?,
                password: non_empty(raw.password).ok_or(Error::ConfigKey("password"))?,
            },
            loader: raw.loader.into(),
        })
    }
}

/// A missing `.env` is not a problem, an unreadable or malformed one is.
fn env_file_problem<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub swarm_url: String,
    pub credentials: Credentials,
}

impl ApiConfig {
    /// Reads the process environment after loading `env_file` (or `.env`) into it.
    /// A missing `.env` is fine, a missing explicit `env_file` is not.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigMissing(path.to_path_buf()));
                }
                if let Err(e) = dotenvy::from_path(path) {
                    tracing::warn!(path = %path.display(), %e, "could not read env file");
                }
            }
            None => {
                if let Some(e) = env_file_problem(dotenvy::dotenv()) {
                    tracing::warn!(%e, "could not read .env file");
                }
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &'static str| non_empty(lookup(key)).ok_or(Error::ConfigKey(key));
        Ok(Self {
            swarm_url: get("SWARM_URL")?,
            credentials: Credentials {
                username: get("USERNAME")?,
                password: get("PASSWORD")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScrapeConfig::load(dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigMissing(_)));
        assert!(err.is_config());
    }

    #[test]
    fn loads_credentials_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "alice", "password": "pw"}}"#).unwrap();
        let config = ScrapeConfig::load(file.path()).unwrap();
        assert_eq!(config.credentials.username, "alice");
        assert_eq!(config.swarm_url, DEFAULT_SWARM_URL);
        assert_eq!(config.loader, LoaderOptions::default());
    }

    #[test]
    fn loader_overrides() {
        let config = ScrapeConfig::from_json(
            r#"{"username": "a", "password": "b", "swarm_url": "http://s",
                "loader": {"settle_delay_ms": 50, "max_polls": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.swarm_url, "http://s");
        assert_eq!(config.loader.settle_delay, Duration::from_millis(50));
        assert_eq!(config.loader.stable_threshold, DEFAULT_STABLE_THRESHOLD);
        assert_eq!(config.loader.max_polls, None);
    }

    #[test]
    fn blank_password_is_missing() {
        let err = ScrapeConfig::from_json(r#"{"username": "a", "password": " "}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigKey("password")));
    }

    #[test]
    fn bad_json_is_config_error() {
        assert!(ScrapeConfig::from_json("{").unwrap_err().is_config());
    }

    #[test]
    fn api_config_needs_all_keys() {
        fn lookup(env: &HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
            let env = env.clone();
            move |k| env.get(k).map(|v| v.to_string())
        }

        let mut env = HashMap::from([
            ("SWARM_URL", "http://swarm"),
            ("USERNAME", "bob"),
            ("PASSWORD", "pw"),
        ]);
        let config = ApiConfig::from_lookup(lookup(&env)).unwrap();
        assert_eq!(config.swarm_url, "http://swarm");

        env.remove("USERNAME");
        let err = ApiConfig::from_lookup(lookup(&env)).unwrap_err();
        assert!(matches!(err, Error::ConfigKey("USERNAME")));
    }

    #[test]
    fn malformed_env_file_is_reported_missing_one_is_not() {
        let dir = tempfile::tempdir().unwrap();
        assert!(env_file_problem(dotenvy::from_path(dir.path().join(".env"))).is_none());

        let bad = dir.path().join("bad.env");
        std::fs::write(&bad, "SWARM_URL http://swarm\n").unwrap();
        assert!(env_file_problem(dotenvy::from_path(&bad)).is_some());
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials {
            username: "a".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
