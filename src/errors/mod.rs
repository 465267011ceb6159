/// Error types for the fan-out hub
///
/// Three families live here:
/// - `FanoutError`: list-level and structural failures that flip the
///   boolean result of a publish or broadcast to `false`
/// - `DeliveryError`: a single subscriber write failing; absorbed by the
///   publish engine and turned into registry cleanup
/// - `ConfigError`: loading and validating the TOML configuration
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FanoutError {
    #[error("Invalid channel list: {raw:?}")] InvalidChannelList {
        raw: String,
    },

    #[error("Channel rejected ({channel}): {reason}")] ChannelRejected {
        channel: String,
        reason: String,
    },

    #[error("Event rejected ({event}): {reason}")] EventRejected {
        event: String,
        reason: String,
    },

    #[error("Unknown application: {app_id}")] UnknownApplication {
        app_id: String,
    },

    #[error("Connection limit reached ({limit})")] OverCapacity {
        limit: usize,
    },

    #[error("Structural failure: {0}")] StructuralFailure(String),
}

impl FanoutError {
    /// Short machine-readable label, used as the metrics/log key
    pub fn kind(&self) -> &'static str {
        match self {
            FanoutError::InvalidChannelList { .. } => "invalid_channel_list",
            FanoutError::ChannelRejected { .. } => "channel_rejected",
            FanoutError::EventRejected { .. } => "event_rejected",
            FanoutError::UnknownApplication { .. } => "unknown_application",
            FanoutError::OverCapacity { .. } => "over_capacity",
            FanoutError::StructuralFailure(_) => "structural_failure",
        }
    }
}

/// Failure writing one frame to one subscriber
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber queue is full")] QueueFull,

    #[error("subscriber connection is closed")] Closed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")] Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")] Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")] Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file '{path}': {source}")] Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config already initialized")] AlreadyInitialized,

    #[error("Config not initialized. Call load_config() first.")] NotInitialized,

    #[error("Invalid configuration: {0}")] Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        let err = FanoutError::InvalidChannelList { raw: String::new() };
        assert_eq!(err.kind(), "invalid_channel_list");
        assert_eq!(
            FanoutError::StructuralFailure("x".to_string()).kind(),
            "structural_failure"
        );
    }

    #[test]
    fn test_error_display() {
        let err = FanoutError::ChannelRejected {
            channel: "room".to_string(),
            reason: "too long".to_string(),
        };
        assert_eq!(err.to_string(), "Channel rejected (room): too long");
        assert_eq!(DeliveryError::QueueFull.to_string(), "subscriber queue is full");
    }
}
