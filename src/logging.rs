use std::error::Error;
use std::io;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Diagnostics go to stderr so that stdout
/// only carries the run report.
///
/// `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
}
