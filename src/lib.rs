//! Dash Docs MCP Server
//!
//! An MCP adapter that exposes the Dash documentation browser's local API as agent tools, with support for multiple transport protocols.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod server;
pub mod tools;
pub mod upstream;
pub mod utils;

/// Re-export common types
pub use crate::error::{Error, Result};
pub use crate::server::{DashDocsServer, ServerConfig};

/// Server version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name
pub const NAME: &str = "dash-docs";

/// Initialize logging system with configuration
///
/// # Errors
/// Returns an error if logging system initialization fails
pub fn init_logging_with_config(config: &crate::config::LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Parse log level
    let level = match config.level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    let filter = EnvFilter::new(level);

    // Build log layers based on configuration
    match (config.enable_console, config.enable_file, &config.file_path) {
        // Enable both console and file logging
        (true, true, Some(file_path)) => {
            let (log_dir, log_file_name) = split_log_path(file_path)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .compact(),
                )
                .with(
                    fmt::layer()
                        .with_writer(file_appender)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .compact(),
                )
                .try_init()
                .map_err(|e| error::Error::Initialization(e.to_string()))?;
        }

        // Enable file logging only
        (false, true, Some(file_path)) => {
            let (log_dir, log_file_name) = split_log_path(file_path)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(file_appender)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .compact(),
                )
                .try_init()
                .map_err(|e| error::Error::Initialization(e.to_string()))?;
        }

        // Console logging in every other case
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .compact(),
                )
                .try_init()
                .map_err(|e| error::Error::Initialization(e.to_string()))?;
        }
    }

    Ok(())
}

/// Split a log file path into directory and file name, creating the directory
fn split_log_path(file_path: &str) -> Result<(std::path::PathBuf, std::ffi::OsString)> {
    let log_dir = std::path::Path::new(file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();
    let log_file_name = std::path::Path::new(file_path)
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("dash-docs.log"))
        .to_os_string();

    std::fs::create_dir_all(&log_dir).map_err(|e| {
        error::Error::Initialization(format!("Failed to create log directory: {e}"))
    })?;

    Ok((log_dir, log_file_name))
}
