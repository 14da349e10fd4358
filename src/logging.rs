//! Tracing subscriber setup for the `velo` binary.
//!
//! Logs go to stderr so stdout stays clean for command output (reports,
//! search results, `--json`). The filter comes from `RUST_LOG` and falls
//! back to `info`, or `debug` with `--verbose`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stderr));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    // Already set when embedded in a host that installed its own subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
