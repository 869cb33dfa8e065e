//! # configs
//!
//! Layered runtime configuration for rusty-shelf.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults (`#[serde(default)]` on every section)
//! 2. an optional config file (`rusty-shelf.toml` unless told otherwise)
//! 3. `RUSTY_SHELF_*` environment variables, `__` between nesting levels,
//!    e.g. `RUSTY_SHELF_DATABASE__URL` or
//!    `RUSTY_SHELF_ENGINE__VOTES__AUTHENTICATED_REPEAT=toggle`
//!
//! A `.env` file in the working directory is read into the environment first.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use rs_core::settings::EngineSettings;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "RUSTY_SHELF";
pub const DEFAULT_CONFIG_FILE: &str = "rusty-shelf.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub log: LogConfig,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite://path.db`, or `memory` for the in-process store.
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://rusty_shelf.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Mixed into every anonymous fingerprint. Changing it orphans every
    /// existing anonymous vote and like.
    #[serde(deserialize_with = "secret_string")]
    pub fingerprint_pepper: SecretString,
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { fingerprint_pepper: SecretString::from(String::new()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { format: LogFormat::Pretty, filter: "info".to_string() }
    }
}

impl AppConfig {
    /// Loads `.env`, then `path` (or [`DEFAULT_CONFIG_FILE`], optional), then
    /// the process environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        if let Ok(dotenv) = dotenvy::dotenv() {
            tracing::debug!(path = %dotenv.display(), "loaded .env");
        }

        let file = match path {
            Some(p) => File::with_name(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::build(Config::builder().add_source(file), None)
    }

    /// Parses an inline TOML document layered under `env` (or the process
    /// environment when `None`).
    pub fn from_toml(toml: &str, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Self::build(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
            env,
        )
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(env);

        let cfg: Self = builder.add_source(environment).build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ranking = &self.engine.ranking;
        if ranking.default_page_size == 0 || ranking.default_page_size > ranking.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "engine.ranking.default_page_size must be within 1..={}",
                ranking.max_page_size
            )));
        }
        if self.engine.comments.max_content_chars == 0 {
            return Err(ConfigError::Invalid(
                "engine.comments.max_content_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
