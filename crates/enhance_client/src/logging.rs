//! tracing subscriber setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Filter for a `-v` count: 0 → warn, 1 → info, 2 → debug, more → trace.
pub fn filter_for_verbosity(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `-v` count.
/// Output goes to stderr so stdout only carries model text.
pub fn init(verbose: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for_verbosity(verbose));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
}
