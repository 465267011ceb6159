/// Core logging implementation with automatic filtering
use super::config::with_logger_config;
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug requires --debug-<tag> (or --debug-hub for engine tags), or --verbose
/// 3. Verbose requires --verbose or --verbose-<tag>
/// 4. Warning/Info respect the minimum level (--quiet drops Info)
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    with_logger_config(|config| match level {
        LogLevel::Debug => config.min_level == LogLevel::Verbose || config.debug_enabled_for(tag),
        LogLevel::Verbose => {
            config.min_level == LogLevel::Verbose || config.verbose_enabled_for(tag)
        }
        _ => level <= config.min_level,
    })
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(&tag, level, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::{set_logger_config, LoggerConfig};

    // Logger config is process-global; all filtering assertions share one test.
    #[test]
    fn test_filtering_rules() {
        let mut config = LoggerConfig::default();
        config.debug_tags.insert("hub".to_string());
        config.verbose_tags.insert("websocket".to_string());
        set_logger_config(config);

        assert!(should_log(&LogTag::Hub, LogLevel::Error));
        assert!(should_log(&LogTag::Hub, LogLevel::Info));
        assert!(should_log(&LogTag::Hub, LogLevel::Debug));
        assert!(should_log(&LogTag::Registry, LogLevel::Debug));
        assert!(!should_log(&LogTag::Webserver, LogLevel::Debug));
        assert!(should_log(&LogTag::Websocket, LogLevel::Verbose));
        assert!(!should_log(&LogTag::Hub, LogLevel::Verbose));

        let mut quiet = LoggerConfig::default();
        quiet.min_level = LogLevel::Warning;
        set_logger_config(quiet);
        assert!(!should_log(&LogTag::System, LogLevel::Info));
        assert!(should_log(&LogTag::System, LogLevel::Warning));

        set_logger_config(LoggerConfig::default());
    }
}
