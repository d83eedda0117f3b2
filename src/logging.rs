//! Tracing subscriber setup for the binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter (e.g. `questview=debug`).
pub const LOG_ENV: &str = "QUESTVIEW_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Build the filter: `--debug` wins, then `QUESTVIEW_LOG`, then `warn`.
pub fn build_filter(debug: bool, env_value: Option<&str>) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    env_value
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber, writing to stderr so stdout stays JSON-only.
/// Calling this more than once is harmless.
pub fn init_logging(debug: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::registry()
        .with(build_filter(debug, env_value.as_deref()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
