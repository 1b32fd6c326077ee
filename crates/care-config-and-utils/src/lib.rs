//! Shared configuration, paths, errors and logging setup for CareLink tools.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, ExecutionMode, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
