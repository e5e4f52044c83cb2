//! Process-wide log subscriber.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! forwards those records alongside the binary's own `tracing` events.
//! Filtering follows `RUST_LOG`, defaulting to `info`. Everything goes to
//! stderr so stdout carries only command output.

use std::io::{self, IsTerminal};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::CliError;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging() -> Result<(), CliError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .try_init()?;
    Ok(())
}
