//! `log` facade bridge
//!
//! Routes records emitted through the `log` crate by dependencies into the
//! tagged logger under `LogTag::External`, so one filter governs all output.

use super::core::log_internal;
use super::levels::LogLevel;
use super::tags::LogTag;

struct FacadeBridge;

static BRIDGE: FacadeBridge = FacadeBridge;

impl log::Log for FacadeBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        super::core::should_log(&LogTag::External, LogLevel::from_log_level(metadata.level()))
    }

    fn log(&self, record: &log::Record<'_>) {
        let level = LogLevel::from_log_level(record.level());
        log_internal(
            LogTag::External,
            level,
            &format!("{}: {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}

/// Install the bridge as the global `log` logger (no-op if one is already set)
pub fn install() {
    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}
