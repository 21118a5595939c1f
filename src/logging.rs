//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise the default level is
/// `info`, or `debug` for this crate when `verbose` is on.
pub fn init(verbose: bool) {
    let default = if verbose {
        "info,senbatsu=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
