//! Diagnostic logging setup.
//!
//! Library code only emits `tracing` events; binaries call [`init`] once.
//! Logs go to stderr so stdout stays free for rendered output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// `filter` wins over `RUST_LOG`; both fall back to [`DEFAULT_FILTER`]. A
/// second call is a no-op.
pub fn init(filter: Option<&str>) {
    let filter = build_filter(filter);
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn build_filter(filter: Option<&str>) -> EnvFilter {
    match filter {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|error| {
            eprintln!("ignoring invalid log filter {directives:?}: {error}");
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}
