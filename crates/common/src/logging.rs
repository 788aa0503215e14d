//! Tracing subscriber setup for castkit binaries.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// HTTP client internals drown out castkit's own debug output.
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "rustls=warn",
];

/// `RUST_LOG` when set, otherwise the configured level with dependency noise
/// capped at `warn`.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = std::iter::once(config.level.as_str())
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Invalid log level {:?} ({e}), using info", config.level);
        EnvFilter::new("info")
    })
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = fmt()
        .with_env_filter(build_filter(config))
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.with_target(true).compact().try_init()
    };
    installed.is_ok()
}
