//! Logging setup for binaries and tests embedding the pool
//!
//! The library itself only emits `tracing` events; these helpers install a
//! subscriber for applications that do not bring their own.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Initialize stdout logging
///
/// Level comes from `RUST_LOG`, defaulting to `info`. Fails if a global
/// subscriber is already installed.
pub fn init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter()),
        )
        .try_init()?;
    Ok(())
}

/// Initialize logging with dual output: stdout plus `dir/file_name`
///
/// Both outputs use the level from `RUST_LOG`. The file copy is written
/// without ANSI colours through a non-blocking writer; keep the returned
/// guard alive for as long as logs should be flushed to the file.
pub fn init_dual_logging(dir: impl AsRef<Path>, file_name: &str) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .try_init()?;

    Ok(guard)
}
