//! # Oracle Telemetry
//!
//! Process-wide logging and metrics exposition for nodes embedding the
//! Price Oracle.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oracle_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_subsystem("18", "price-oracle");
//! init_logging(&config).expect("Failed to init logging");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `quantum-chain` | Service name in logs |
//! | `QC_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `QC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `QC_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `QC_SUBSYSTEM_ID` | `00` | Subsystem id in logs |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{gather_metrics, init_logging};

use thiserror::Error;

/// Telemetry errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to encode metrics: {0}")]
    MetricsEncode(String),
}
