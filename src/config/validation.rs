//! Configuration validation
//!
//! Zero limits, zero ports and empty host names are already rejected by the
//! types. What remains are combinations that are legal but suspicious.

use anyhow::Result;
use tracing::warn;

use super::types::Config;

impl Config {
    /// Validate configuration, logging a warning for each suspicious setting
    pub fn validate(&self) -> Result<()> {
        let pool = &self.pool;
        if pool
            .max_connections
            .get()
            .checked_mul(pool.max_multiplex.get())
            .is_none()
        {
            anyhow::bail!(
                "max_connections ({}) x max_multiplex ({}) overflows",
                pool.max_connections,
                pool.max_multiplex
            );
        }

        for warning in self.warnings() {
            warn!("{}", warning);
        }
        Ok(())
    }

    /// Legal but suspicious settings
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let pool = &self.pool;
        let mut warnings = Vec::new();

        if pool.cache && !pool.retain_idle {
            warnings.push(
                "pool.cache = true with pool.retain_idle = false: slots are kept as \
                 placeholders but their connections are dropped as soon as they go idle"
                    .to_string(),
            );
        }

        if pool.max_multiplex.get() == 1 {
            warnings.push(
                "pool.max_multiplex = 1: connections that do not report a limit carry \
                 one request at a time"
                    .to_string(),
            );
        }

        warnings
    }
}
