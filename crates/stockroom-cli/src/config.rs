//! Persistent CLI configuration.
//!
//! Stored as `cli-config.json` in the platform config directory. Every key
//! can be overridden from the environment (`.env` files included).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stockroom_core::config::{EngineConfig, DEFAULT_COLLECTION};
use stockroom_core::util::{is_http_url, normalize_text_option};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const APP_DIR: &str = "stockroom";

pub const ENV_API_URL: &str = "STOCKROOM_API_URL";
pub const ENV_API_TOKEN: &str = "STOCKROOM_API_TOKEN";
pub const ENV_COLLECTION: &str = "STOCKROOM_COLLECTION";
pub const ENV_DB_PATH: &str = "STOCKROOM_DB_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// `Some(0)` disables periodic sync
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("stockroom.db")
}

impl CliConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Apply `STOCKROOM_*` overrides read through `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_API_TOKEN)) {
            self.api_token = Some(token);
        }
        if let Some(collection) = normalize_text_option(lookup(ENV_COLLECTION)) {
            self.collection = Some(collection);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
    }

    /// Config file plus process environment
    pub fn load_effective() -> Result<Self, CliError> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Database path: flag, then config/env, then the platform data dir
    pub fn resolve_db_path(&self, cli_db_path: Option<PathBuf>) -> PathBuf {
        cli_db_path
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(default_db_path)
    }

    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let url = self
            .api_base_url
            .as_deref()
            .ok_or(CliError::BackendNotConfigured)?;
        if !is_http_url(url) {
            return Err(CliError::Config(format!(
                "API URL must include http:// or https://, got '{url}'"
            )));
        }

        let mut engine = EngineConfig::new(url)
            .with_collection(self.collection.as_deref().unwrap_or(DEFAULT_COLLECTION));
        if let Some(token) = &self.api_token {
            engine = engine.with_token(token.as_str());
        }
        if let Some(secs) = self.request_timeout_secs {
            engine = engine.with_request_timeout(Duration::from_secs(secs));
        }
        engine = match self.sync_interval_secs {
            Some(0) => engine.without_auto_sync(),
            Some(secs) => engine.with_sync_interval(Duration::from_secs(secs)),
            None => engine,
        };
        engine.validate()?;
        Ok(engine)
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.api_token = normalize_text_option(self.api_token.take());
        self.collection = normalize_text_option(self.collection.take());
        if self.version == 0 {
            self.version = default_config_version();
        }
    }
}
