use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise `default_level` (e.g. the
/// `LOG_LEVEL` setting), quieting sqlx statement logs below warn.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},sqlx=warn,sea_orm=warn")))
}

/// Initialize tracing subscriber with compact human-readable output on stdout.
pub fn init_logging_default(default_level: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output on stdout.
pub fn init_logging_json(default_level: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .json()
        .with_writer(io::stdout)
        .try_init();
}
