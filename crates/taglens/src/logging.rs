//! Logging initialization.
//!
//! Logs go to stderr so stdout stays clean for tag output. `RUST_LOG`
//! overrides the configured level.

use taglens_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the subscriber with `level` as the default filter.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section, with CLI flag overrides.
pub fn init_from_config(config: &taglens_core::Config, verbose: bool, json_logs: bool) {
    let (level, json) = resolve(&config.logging, verbose, json_logs);
    init(level, json);
}

fn resolve(logging: &LoggingConfig, verbose: bool, json_logs: bool) -> (&str, bool) {
    let level = match logging.level.as_str() {
        "trace" => "trace",
        _ if verbose => "debug",
        level => level,
    };
    (level, json_logs || logging.format == "json")
}
