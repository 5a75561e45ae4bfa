//! Backend settings: where the data files live, the token key, lock tuning.
//!
//! Loaded from a TOML file (every field optional) and then overlaid with the
//! `TOKEN_KEY` environment variable, which always wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lock::RetryPolicy;

pub const TOKEN_KEY_ENV: &str = "TOKEN_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Holds `movies/` and `users/` JSON files
    pub data_dir: PathBuf,
    /// Static root; poster renditions go under `images/movies/`
    pub public_dir: PathBuf,
    pub token_key: String,
    pub token_ttl_days: i64,
    pub lock: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            public_dir: PathBuf::from("public"),
            token_key: String::new(),
            token_ttl_days: 7,
            lock: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Read settings from `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        Ok(config.with_env())
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for when there is no settings file.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var(TOKEN_KEY_ENV) {
            if !key.is_empty() {
                self.token_key = key;
            }
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_days < 1 {
            return Err(ConfigError::Invalid(format!(
                "token_ttl_days must be at least 1, got {}",
                self.token_ttl_days
            )));
        }
        if self.lock.factor.is_nan() || self.lock.factor < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "lock.factor must be at least 1, got {}",
                self.lock.factor
            )));
        }
        if self.lock.min_timeout_ms > self.lock.max_timeout_ms {
            return Err(ConfigError::Invalid(
                "lock.min_timeout_ms exceeds lock.max_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn movies_file(&self) -> PathBuf {
        self.data_dir.join("movies").join("MoviesList.json")
    }

    pub fn last_updated_file(&self) -> PathBuf {
        self.data_dir.join("movies").join("lastUpdatedAt.json")
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("users").join("UsersList.json")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.public_dir.join("images").join("movies")
    }

    /// Defaults rooted at `root`, for tests and embedded use.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            public_dir: root.join("public"),
            ..Self::default()
        }
    }
}
