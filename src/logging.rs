//! Tracing initialization shared by the host program and tests.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    // Guard against double initialization from embedding hosts.
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    tracing::info!(target = "proxy", "tracing initialized");
}
