//! Log subscriber setup
//!
//! Lockdown notices go out on the `lockdown` target at WARN so they survive
//! the usual production filters. Everything else follows `RUST_LOG`, falling
//! back to the configured directive.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, DEFAULT_LOG_FILTER};

/// Install the global subscriber.
///
/// # Example
/// ```ignore
/// init_tracing(LogFormat::Text, None)?;
/// ```
pub fn init_tracing(
    format: LogFormat,
    filter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directive = filter.unwrap_or(DEFAULT_LOG_FILTER);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?,
    }

    tracing::debug!(format = ?format, filter = directive, "tracing initialized");
    Ok(())
}
