//! # Application Configuration
//!
//! Defines the configuration of the `nlsql` binary and loads it from a YAML file plus
//! environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use nlsql::{PipelineSettings, ProviderConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use thiserror::Error;
use tracing::info;

static ENV_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").expect("placeholder pattern is valid"));

/// A custom error type for configuration issues.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    #[error("Configuration error: {0}")]
    General(String),
    /// Indicates a required configuration file was not found.
    #[error("{0}")]
    NotFound(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The fully resolved configuration of the `nlsql` binary.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The SQLite database that is introspected and queried.
    pub db_url: String,
    /// Where conversation contexts live. `:memory:` keeps them for one process only.
    pub context_db_url: String,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Reads a file and replaces every `${VAR}` with the value of that environment variable.
///
/// Unset variables become empty strings. Returns `Ok(None)` if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let expanded = ENV_PLACEHOLDER.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.to_string()))
}

/// Substitution leaves unset variables as `""`; those mean "not configured".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Loads the application configuration from a file and environment variables.
///
/// - Top-level keys like `db_url` are overridden by `DB_URL`.
/// - Nested keys are overridden by `NLSQL_...` variables (e.g. `NLSQL_PIPELINE__SCHEMA_BUDGET`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let mut builder = ConfigBuilder::builder()
        .set_default("db_url", "db/nlsql.db")?
        .set_default("context_db_url", "db/contexts.db")?;

    let main_config_path = if let Some(override_path) = config_path_override {
        override_path.to_string()
    } else {
        let user_config_path = format!("{base_path}/config.yml");
        if std::path::Path::new(&user_config_path).exists() {
            info!("Loading user-defined configuration from '{user_config_path}'.");
            user_config_path
        } else {
            let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "local".to_string());
            let fallback_path = format!("{base_path}/config.{provider}.yml");
            info!("'{user_config_path}' not found. Falling back to '{fallback_path}' based on AI_PROVIDER='{provider}'.");
            fallback_path
        }
    };

    let main_content = read_and_substitute(&main_config_path)?.ok_or_else(|| {
        ConfigError::NotFound(format!(
            "Main config file not found at '{main_config_path}'. Please ensure 'config.yml' exists or your AI_PROVIDER is set to load a valid template ('local' or 'gemini')."
        ))
    })?;
    builder = builder.add_source(File::from_str(&main_content, FileFormat::Yaml));

    let settings = builder
        .add_source(Environment::default())
        .add_source(
            Environment::with_prefix("NLSQL")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    config.provider.api_url = non_empty(config.provider.api_url);
    config.provider.api_key = non_empty(config.provider.api_key);
    config.provider.model_name = non_empty(config.provider.model_name);

    Ok(config)
}
