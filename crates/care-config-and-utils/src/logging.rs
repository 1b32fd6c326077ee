//! Logging initialization for CareLink binaries.
//!
//! Thin wrapper over the observability crate that reads the `CARELINK_OBS_*`
//! environment knobs.

use crate::Paths;
use observability::{LogConfig, ObservabilityMode};
use std::path::PathBuf;

/// Initialize logging for a binary.
///
/// - Level from `RUST_LOG`, else `level`.
/// - `CARELINK_OBS_MODE=prod` drops structured fields from the JSONL sink.
/// - `CARELINK_LOG_FILE=<path>` (or `1` for `paths.log_file()`) enables
///   the JSONL sink; stderr output is always on.
pub fn init_logging(service_name: &str, level: &str, paths: &Paths) {
    let mode = std::env::var("CARELINK_OBS_MODE")
        .map(|raw| ObservabilityMode::parse(&raw))
        .unwrap_or_default();

    let log_path = resolve_log_path(std::env::var("CARELINK_LOG_FILE").ok(), paths);

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path,
        also_stderr: true,
        mode,
    });
}

fn resolve_log_path(raw: Option<String>, paths: &Paths) -> Option<PathBuf> {
    raw.and_then(non_empty_env).map(|raw| match raw.as_str() {
        "1" | "true" => paths.log_file(),
        _ => PathBuf::from(raw),
    })
}

fn non_empty_env(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
