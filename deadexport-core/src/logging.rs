//! Structured logging using **tracing**.
//!
//! Log output always goes to stderr so stdout stays reserved for
//! diagnostics. Filtering follows `RUST_LOG` (e.g. `RUST_LOG=deadexport_core=debug`);
//! without it only warnings and errors are shown.

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable events
    #[default]
    Compact,
    /// One JSON object per event, for log collectors
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initializes the global tracing subscriber.
///
/// Call once at process start. A second call is a no-op.
pub fn init_logging(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match format {
        LogFormat::Json => builder
            .json()
            .with_ansi(false)
            .with_current_span(true)
            .try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    // Already initialized (tests, embedding hosts)
    let _ = result;
}
