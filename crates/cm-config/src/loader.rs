//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CUSTOMER_MANAGER_CONFIG";

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "customer-manager.toml",
    "./config/config.toml",
    "/etc/customer-manager/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found), apply environment
    /// overrides and validate the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `CUSTOMER_MANAGER_*` overrides. Values that fail to parse are ignored.
fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("CUSTOMER_MANAGER_{name}"));

    // HTTP
    if let Some(val) = var("HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(port) = var("HTTP_PORT").and_then(|v| v.parse().ok()) {
        config.http.port = port;
    }

    // Stores
    if let Some(val) = var("DATABASE_URL") {
        config.database.url = val;
    }
    if let Some(n) = var("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        config.database.max_connections = n;
    }
    if let Some(val) = var("REDIS_URL") {
        config.redis.url = val;
    }
    if let Some(val) = var("REDIS_KEY_PREFIX") {
        config.redis.key_prefix = val;
    }
    if let Some(val) = var("AMQP_URI") {
        config.amqp.uri = val;
    }
    if let Some(val) = var("AMQP_EXCHANGE") {
        config.amqp.exchange = val;
    }

    // Collaborators
    if let Some(val) = var("EMAIL_VERIFY_BASE_URL") {
        config.email.verify_base_url = val;
    }
    if let Some(val) = var("EMAIL_SERVICE_URL") {
        config.email.service_url = val;
    }
    if let Some(val) = var("DIRECTORY_URL") {
        config.directory.url = val;
    }

    // Lifecycle
    if let Some(days) = var("FROZEN_RETENTION_DAYS").and_then(|v| v.parse().ok()) {
        config.lifecycle.frozen_retention_days = days;
    }
    if let Some(secs) = var("UNVERIFIED_MAX_AGE_SECS").and_then(|v| v.parse().ok()) {
        config.lifecycle.unverified_max_age_secs = secs;
    }
    if let Some(enabled) = var("JANITOR_ENABLED").and_then(|v| v.parse().ok()) {
        config.janitor.enabled = enabled;
    }
    if let Some(secs) = var("JANITOR_UNVERIFIED_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.janitor.unverified_interval_secs = secs;
    }
    if let Some(secs) = var("JANITOR_FROZEN_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.janitor.frozen_interval_secs = secs;
    }

    // General
    if let Some(val) = var("DEV_MODE") {
        config.dev_mode = val.parse().unwrap_or(false);
    }
}
