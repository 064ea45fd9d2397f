//! Structured logging bootstrap.

#![deny(unsafe_code)]

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize structured logging (JSON) with env filter.
/// Set RUST_LOG, e.g., "info,policy=debug".
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Initialize human-readable logging for interactive CLI use. Events go to
/// stderr so JSON command output on stdout stays parseable.
pub fn init_cli_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = fmt::layer().compact().with_target(false).with_writer(std::io::stderr);
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}
