//! Structured logging on stderr.
//!
//! stdout belongs to command output (generated code, scan reports), so
//! every layer writes to stderr.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing::Subscriber;
use tracing_subscriber::{
    fmt, fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format,
/// respecting the configured log level. `RUST_LOG` wins when set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

/// Process-wide span carrying the service name.
///
/// Enter it for the life of the process; every event logged inside it
/// lists the service in its span context.
pub fn root_span(config: &TelemetryConfig) -> tracing::Span {
    tracing::info_span!("typexpand", service = %config.service_name)
}

/// JSON layer listing every enclosing span, so the root span's service
/// name appears next to the per-build fingerprint.
fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_current_span(false)
        .with_span_list(true)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(json_layer(std::io::stderr).with_filter(filter))
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
///
/// The engine emits these as the `event` field so JSON logs can be
/// filtered without parsing messages.
pub mod events {
    /// A build passed the cache and started running.
    pub const BUILD_STARTED: &str = "build_started";

    /// A build completed and its result was cached.
    pub const BUILD_FINISHED: &str = "build_finished";

    /// A build was answered from the cache.
    pub const CACHE_HIT: &str = "cache_hit";

    /// An expander faulted while generating code for a type.
    pub const EXPANDER_FAILED: &str = "expander_failed";

    /// An output file (source or artifact) was written.
    pub const OUTPUT_WRITTEN: &str = "output_written";
}
