//! # Station Telemetry
//!
//! Logging and metrics for the station core.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use station_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STATION_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `STATION_JSON_LOGS` | `false` | JSON formatted logs |
//! | `STATION_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `STATION_SERVICE_NAME` | `station` | Service name in the startup record |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, record_dispatch, register_metrics, MetricsHandle, CONNECTIONS_ACTIVE,
    CONNECTIONS_DROPPED, DISPATCH_TOTAL, EVENTS_EMITTED, MODULES_RUNNING, NOTIFY_BROADCASTS,
    SYNC_DISPATCH_DURATION, TIMER_RUNS, UI_ACTIONS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard { metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    #[must_use]
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Config("bad level".into());
        assert_eq!(err.to_string(), "Invalid configuration: bad level");
    }
}
