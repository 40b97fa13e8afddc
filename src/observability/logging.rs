//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the binary
//! - Configure log level from config, overridable via `RUST_LOG`
//!
//! # Design Decisions
//! - Logs go to stderr so stdout stays free for tooling
//! - Library code only emits events; installing a subscriber is the binary's job

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Calling this twice is
/// harmless: the second install fails silently.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("wsrest={default_level},tower_http={default_level}").into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
