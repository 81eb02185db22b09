//! Configuration loading from files and environment variables
//!
//! Environment variables take precedence over the file:
//! - `MUXPOOL_MAX_CONNECTIONS`
//! - `MUXPOOL_MAX_MULTIPLEX`
//! - `MUXPOOL_STRATEGY`

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::types::Config;
use crate::constants::env;

/// Where a loaded configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Default,
}

/// Parse a TOML document without consulting the environment
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}

/// Apply environment overrides through `lookup`, returning the keys applied
///
/// `lookup` is normally `|key| std::env::var(key).ok()`. A present but
/// invalid value is an error rather than being silently ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<Vec<&'static str>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();

    if let Some(value) = lookup(env::MAX_CONNECTIONS) {
        config.pool.max_connections = value
            .parse()
            .with_context(|| format!("Invalid {}='{}'", env::MAX_CONNECTIONS, value))?;
        applied.push(env::MAX_CONNECTIONS);
    }

    if let Some(value) = lookup(env::MAX_MULTIPLEX) {
        config.pool.max_multiplex = value
            .parse()
            .with_context(|| format!("Invalid {}='{}'", env::MAX_MULTIPLEX, value))?;
        applied.push(env::MAX_MULTIPLEX);
    }

    if let Some(value) = lookup(env::STRATEGY) {
        config.pool.strategy = value
            .parse()
            .with_context(|| format!("Invalid {}='{}'", env::STRATEGY, value))?;
        applied.push(env::STRATEGY);
    }

    for key in &applied {
        info!(variable = *key, "Configuration overridden from environment");
    }
    Ok(applied)
}

/// Load configuration from a TOML file, with environment overrides
pub fn load_config(config_path: impl AsRef<Path>) -> Result<Config> {
    let path = config_path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load from `config_path` if it exists, otherwise start from defaults
///
/// Environment overrides apply in both cases.
pub fn load_config_with_fallback(config_path: impl AsRef<Path>) -> Result<(Config, ConfigSource)> {
    let path = config_path.as_ref();
    if path.exists() {
        return Ok((load_config(path)?, ConfigSource::File));
    }

    info!(
        path = %path.display(),
        "Config file not found, using defaults"
    );
    let mut config = create_default_config();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok((config, ConfigSource::Default))
}

/// Create a default configuration for examples/testing
#[must_use]
pub fn create_default_config() -> Config {
    Config::default()
}
