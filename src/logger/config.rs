/// Logger configuration derived from command-line flags
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Highest level that may be printed (Info by default)
    pub min_level: LogLevel,
    /// Tags with `--debug-<tag>` enabled
    pub debug_tags: HashSet<String>,
    /// Tags with `--verbose-<tag>` enabled
    pub verbose_tags: HashSet<String>,
    /// Colored console output
    pub colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            colors: true,
        }
    }
}

impl LoggerConfig {
    pub fn debug_enabled_for(&self, tag: &LogTag) -> bool {
        self.debug_tags.contains(&tag.to_debug_key())
            || (tag.is_hub_component() && self.debug_tags.contains("hub"))
    }

    pub fn verbose_enabled_for(&self, tag: &LogTag) -> bool {
        self.verbose_tags.contains(&tag.to_debug_key())
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Run `f` against the current config under the read lock
///
/// `f` must not call back into the logger config.
pub fn with_logger_config<R>(f: impl FnOnce(&LoggerConfig) -> R) -> R {
    f(&LOGGER_CONFIG.read())
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn colors_enabled() -> bool {
    LOGGER_CONFIG.read().colors
}

/// Build the logger configuration from the global command-line arguments
pub fn init_from_args() {
    let args = arguments::get_cmd_args();
    let mut config = LoggerConfig::default();

    for arg in &args {
        if let Some(tag) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(tag.to_lowercase());
        } else if let Some(tag) = arg.strip_prefix("--verbose-") {
            config.verbose_tags.insert(tag.to_lowercase());
        }
    }

    if arguments::is_verbose_enabled() {
        config.min_level = LogLevel::Verbose;
    }

    if arguments::is_quiet_enabled() {
        config.min_level = LogLevel::Warning;
    }

    if arguments::has_arg("--no-color") {
        config.colors = false;
    }

    set_logger_config(config);
}
