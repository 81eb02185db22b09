//! Configuration types

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::pool::Strategy;
use crate::types::{Destination, HostName, MaxConnections, MaxMultiplex, Port, SchemeName};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// The `[destination]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(default = "defaults::scheme")]
    pub scheme: SchemeName,
    #[serde(default = "defaults::host")]
    pub host: HostName,
    /// Falls back to the scheme's well-known port, then to 80
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Port>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            scheme: defaults::scheme(),
            host: defaults::host(),
            port: None,
        }
    }
}

impl DestinationConfig {
    #[must_use]
    pub fn effective_port(&self) -> Port {
        self.port
            .or_else(|| Port::for_scheme(&self.scheme))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn destination(&self) -> Destination {
        Destination::new(
            self.scheme.clone(),
            self.host.clone(),
            self.effective_port(),
        )
    }
}

/// The `[pool]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "defaults::max_connections")]
    pub max_connections: MaxConnections,
    /// Default capacity of connections that do not report their own
    #[serde(default = "defaults::max_multiplex")]
    pub max_multiplex: MaxMultiplex,
    #[serde(default = "defaults::strategy")]
    pub strategy: Strategy,
    /// Keep removed slots as placeholders instead of compacting
    #[serde(default = "defaults::cache")]
    pub cache: bool,
    /// Keep connections whose last lease was released
    #[serde(default = "defaults::retain_idle")]
    pub retain_idle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::max_connections(),
            max_multiplex: defaults::max_multiplex(),
            strategy: defaults::strategy(),
            cache: defaults::cache(),
            retain_idle: defaults::retain_idle(),
        }
    }
}
