//! Tracing subscriber setup for binaries and tests embedding the node

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `dwn_records=<log_level>,info`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(log_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dwn_records={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
