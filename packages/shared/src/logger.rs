//! Logging setup utilities for the clinic chat binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The filter covers the library crate and the binary itself. `RUST_LOG`
/// overrides it entirely when set.
///
/// # Arguments
///
/// * `crate_name` - The library crate whose events should be shown (e.g., "clinic_chat_server")
/// * `binary_name` - The name of the binary (e.g., "clinic-chat-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use clinic_chat_shared::logger::setup_logger;
///
/// setup_logger("clinic_chat_server", "clinic-chat-server", "debug");
/// ```
pub fn setup_logger(crate_name: &str, binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(crate_name, binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the `EnvFilter` directive used when `RUST_LOG` is not set.
///
/// Target names use underscores, so dashes in either name are normalized.
pub fn default_filter(crate_name: &str, binary_name: &str, default_log_level: &str) -> String {
    format!(
        "{}={},{}={},tower_http={}",
        crate_name.replace('-', "_"),
        default_log_level,
        binary_name.replace('-', "_"),
        default_log_level,
        default_log_level
    )
}
