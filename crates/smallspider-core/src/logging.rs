//! Logging integration.
//!
//! Helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-request spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level`. Debug mode uses a pretty,
/// human-readable format; otherwise logs are structured JSON. Installing a
/// second subscriber is a no-op, so tests may call this freely.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one admin request.
///
/// # Examples
///
/// ```
/// use smallspider_core::logging::admin_span;
///
/// let span = admin_span("blog.post", "alice");
/// let _guard = span.enter();
/// tracing::info!("listing posts");
/// ```
pub fn admin_span(model_key: &str, username: &str) -> tracing::Span {
    tracing::info_span!("admin", model = model_key, user = username)
}
