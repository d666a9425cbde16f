use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const DEFAULT_FILTER: &str = "warn,lexmerge_core=info,lexmerge_engine=info";

/// Log to stderr so `--json` output on stdout stays machine readable.
/// `RUST_LOG` replaces the default filter.
pub fn configure_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,lexmerge_core=debug,lexmerge_engine=debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    let stderr_log = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_log).init();
}
