//! Logging setup for the binary.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, Layer};

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init(default_level: LevelFilter) -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init()
}
