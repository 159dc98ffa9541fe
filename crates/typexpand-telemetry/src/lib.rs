//! Logging infrastructure for typexpand.
//!
//! Provides structured logging (JSON or human-readable) and the standard
//! event names the expansion engine emits.
//!
//! # Usage
//!
//! ```ignore
//! use typexpand_telemetry::{LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("debug")
//!     .with_log_format(LogFormat::Json);
//!
//! typexpand_telemetry::init(&config)?;
//! let _root = typexpand_telemetry::root_span(&config).entered();
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{events, init_logging, root_span};

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

/// Initialize telemetry for a process.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)?;
    tracing::debug!(
        service = %config.service_name,
        level = %config.log_level,
        "logging initialized"
    );
    Ok(())
}
