/// Configuration module for the viewer.
///
/// Handles loading, validating, and providing default configuration values.
/// Credentials may also come from the `PINATA_API_KEY` and
/// `PINATA_SECRET_API_KEY` environment variables.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::Credentials;

const API_KEY_ENV: &str = "PINATA_API_KEY";
const SECRET_KEY_ENV: &str = "PINATA_SECRET_API_KEY";

// ── Default value functions ──────────────────────────────────────────

fn default_gateway_url() -> String {
    "https://gateway.pinata.cloud".to_string()
}

fn default_api_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_extract_timeout_secs() -> u64 {
    120
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_capacity() -> usize {
    8
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinata_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinata_secret_api_key: Option<String>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_extract_timeout_secs")]
    pub extract_timeout_secs: u64,

    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Parent directory for extracted bundles. Defaults to the user cache dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Maximum number of extracted repositories kept alive.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Idle time after which an extraction is evicted. `0` disables expiry.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            api_url: default_api_url(),
            pinata_api_key: None,
            pinata_secret_api_key: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            extract_timeout_secs: default_extract_timeout_secs(),
            git_binary: default_git_binary(),
            work_dir: None,
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and generates a
    /// template file for the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        let mut cfg = if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }
            cfg
        } else {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {path}"))?;

            match serde_json::from_str(&data) {
                Ok(c) => {
                    info!("Loaded configuration from {path}");
                    c
                }
                Err(e) => {
                    warn!("Invalid JSON in {path}: {e}");
                    warn!("Using default configuration");
                    Self::default()
                }
            }
        };

        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Override credentials from the environment. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.pinata_api_key = Some(key);
        }
        if let Some(secret) = lookup(SECRET_KEY_ENV).filter(|v| !v.is_empty()) {
            self.pinata_secret_api_key = Some(secret);
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.gateway_url.is_empty(), "gateway_url must be set");
        anyhow::ensure!(!self.api_url.is_empty(), "api_url must be set");
        anyhow::ensure!(
            self.fetch_timeout_secs > 0,
            "fetch_timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.extract_timeout_secs > 0,
            "extract_timeout_secs must be positive"
        );
        anyhow::ensure!(self.cache.capacity > 0, "cache.capacity must be positive");
        anyhow::ensure!(!self.git_binary.is_empty(), "git_binary must be set");
        Ok(())
    }

    /// Credentials to send with gateway requests, if both halves are set.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.pinata_api_key, &self.pinata_secret_api_key) {
            (Some(key), Some(secret)) => Some(Credentials {
                api_key: key.clone(),
                secret_api_key: secret.clone(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    /// `None` when idle expiry is disabled.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache.ttl_secs > 0).then(|| Duration::from_secs(self.cache.ttl_secs))
    }

    /// Directory under which each extraction gets its own private subdirectory.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        match &self.work_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ipfs-git-viewer"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway_url, "https://gateway.pinata.cloud");
        assert_eq!(config.fetch_timeout_secs, 60);
        assert_eq!(config.extract_timeout_secs, 120);
        assert_eq!(config.cache.capacity, 8);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(1800)));
        assert!(config.credentials().is_none());
        assert!(config.work_dir().ends_with("ipfs-git-viewer"));
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"gateway_url": "https://example.test", "cache": {"capacity": 2}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gateway_url, "https://example.test");
        assert_eq!(config.cache.capacity, 2);
        // Other fields should have defaults
        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.git_binary, "git");
    }

    #[test]
    fn test_load_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("viewer.json");
        std::fs::write(&path, r#"{"work_dir": "/srv/bundles", "cache": {"ttl_secs": 0}}"#)
            .unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.work_dir(), PathBuf::from("/srv/bundles"));
        assert_eq!(config.cache_ttl(), None);
    }

    #[test]
    fn test_invalid_json_falls_back_to_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.cache.capacity, 8);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "PINATA_API_KEY" => Some("key".to_string()),
            "PINATA_SECRET_API_KEY" => Some("secret".to_string()),
            _ => None,
        });
        let creds = config.credentials().unwrap();
        assert_eq!(creds.api_key, "key");
        assert_eq!(creds.secret_api_key, "secret");
    }

    #[test]
    fn test_half_credentials_are_ignored() {
        let mut config = Config::default();
        config.apply_env(|key| (key == "PINATA_API_KEY").then(|| "key".to_string()));
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization_roundtrip_omits_secrets() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(!json.contains("pinata_api_key"));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.gateway_url, config.gateway_url);
        assert_eq!(parsed.cache.capacity, config.cache.capacity);
    }
}
