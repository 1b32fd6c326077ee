//! # Observability
//!
//! Centralized logging setup for the CareLink workspace.
//!
//! Binaries call `observability::init()` (or `init_with_config`) once at
//! startup and use the standard `tracing` macros everywhere else. Library
//! crates never install a subscriber themselves.
//!
//! ## Sinks
//!
//! - **stderr**: compact human-readable lines, always available.
//! - **JSONL file**: one structured entry per line, enabled by setting
//!   `LogConfig::log_path`. `tail -f ~/.carelink/logs/dev.jsonl | jq` works.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("carectl");
//!     tracing::info!("ready");
//! }
//! ```

mod file_sink;
mod json_layer;

use std::path::PathBuf;

pub use json_layer::LogEntry;

/// Export policy for structured fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservabilityMode {
    /// Keep every structured field (actor ids, resident ids, payload codes).
    #[default]
    DevVerbose,
    /// Write message, level and target only. Structured fields are dropped
    /// from file output since they may identify residents.
    ProdMetadataOnly,
}

impl ObservabilityMode {
    /// Parse a mode string (`dev`, `prod`, `production`). Unknown values fall
    /// back to `DevVerbose`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::ProdMetadataOnly,
            _ => Self::DevVerbose,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "carectl").
    /// Included in every JSONL line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL file to append to. `None` disables the file sink.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr when the file sink is enabled.
    pub also_stderr: bool,

    /// Field export policy.
    pub mode: ObservabilityMode,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
            mode: ObservabilityMode::DevVerbose,
        }
    }
}

/// Initialize logging with default settings (stderr only).
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Calling this more than once is a no-op after the first successful call.
///
/// ```rust,ignore
/// observability::init_with_config(observability::LogConfig {
///     service_name: "carectl".into(),
///     default_level: "debug".into(),
///     log_path: Some("/var/log/carectl.jsonl".into()),
///     ..Default::default()
/// });
/// ```
pub fn init_with_config(config: LogConfig) {
    if let Some(log_path) = &config.log_path {
        file_sink::init_file_subscriber(&config, log_path);
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.default_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
