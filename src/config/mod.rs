//! Configuration module
//!
//! Pool configuration is read from a TOML file with a `[destination]` and a
//! `[pool]` table. Environment variables override the file so container
//! deployments can tune a pool without editing it.

mod defaults;
mod loading;
mod types;
mod validation;

pub use loading::{
    ConfigSource, apply_env_overrides, create_default_config, load_config,
    load_config_with_fallback, parse_config,
};
pub use types::{Config, DestinationConfig, PoolConfig};

pub use defaults::{cache, max_connections, max_multiplex, retain_idle};
