//! Structured logging setup.
//!
//! Logs go to stderr so that CLI output on stdout stays parseable.
//! `RUST_LOG` overrides the configured level when set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// HTTP and PDF internals that are only interesting at `warn`.
const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "h2", "tower_http", "rmcp", "sqlx", "lopdf"];

fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = String::from(level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }
    EnvFilter::new(directives)
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = build_filter(&config.level);
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true);
        let _ = subscriber.with(layer).try_init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(layer).try_init();
    }

    tracing::debug!(level = %config.level, format = %config.format, "logging initialized");
}
