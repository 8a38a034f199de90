//! Tracing subscriber setup for the binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default `RUST_LOG` when the variable is not set
pub const DEFAULT_LOG_FILTER: &str = "team_orchestrator=info";

/// Install the global subscriber: `RUST_LOG` (or `default_filter`) for
/// filtering, JSON lines when `log_json` is set. Logs go to stderr so stdout
/// stays free for console output.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
