//! Tracing initialisation for survfold binaries.
//!
//! Log lines go to stderr so command output on stdout stays machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// # Arguments
///
/// * `json` - write events as newline-delimited JSON instead of the
///   human-readable format
/// * `level` - default maximum level; `RUST_LOG` replaces it when set
///
/// Only the first call in a process takes effect; later calls are no-ops.
///
/// # Example
///
/// ```ignore
/// survfold_core::init_tracing(false, tracing::Level::DEBUG);
/// // RUST_LOG=survfold_core=trace overrides the DEBUG default
/// ```
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}
