//! Log output for backup runs.
//!
//! Everything goes to stderr through `tracing`; stdout carries only the final
//! run summary and command results so it can be piped.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `info`, or `debug` with
/// `--verbose`.
///
/// # Example
/// ```bash
/// RUST_LOG=backup=trace backup run --full
/// ```
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(verbose)
                .compact(),
        )
        .init();
}
