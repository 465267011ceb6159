//! Structured logging for channelcast
//!
//! This module provides a small, tagged logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug-<tag> flags
//! - Colored console output
//! - A `log` crate bridge for third-party records
//!
//! ## Usage
//!
//! ```rust
//! use channelcast::logger::{self, LogTag};
//!
//! logger::error(LogTag::Hub, "Registry shut down");
//! logger::info(LogTag::Webserver, "Listening on 127.0.0.1:6001");
//! logger::debug(LogTag::Publish, "Fan-out details"); // Only with --debug-publish or --debug-hub
//! ```
//!
//! Call `logger::init()` once at startup, after command-line arguments are
//! available.

mod bridge;
mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{init_from_args, set_logger_config, with_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Parses debug flags from the command line and installs the `log` bridge.
pub fn init() {
    config::init_from_args();
    bridge::install();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, only shown with --debug-<tag>
///
/// Engine tags (`Registry`, `Publish`, `Broadcast`, `Reporter`) are also
/// enabled by `--debug-hub`.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, only shown with --verbose or --verbose-<tag>
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Check whether a debug message for `tag` would be printed
///
/// Lets callers skip building expensive messages.
pub fn is_debug_enabled(tag: &LogTag) -> bool {
    core::should_log(tag, LogLevel::Debug)
}
