/// Configuration schemas - all config structures defined once with defaults
///
/// Each section is declared with `config_struct!`, so a TOML file only needs
/// the keys it wants to override.
use serde::{Deserialize, Serialize};

use crate::config_struct;
use crate::errors::ConfigError;

/// What to do when a broadcast channel list names the same channel twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Publish once per occurrence ("a,a" publishes to "a" twice)
    #[default]
    Preserve,
    /// Publish once per distinct channel, keeping first-seen order
    Deduplicate,
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

config_struct! {
    /// HTTP / WebSocket listener
    pub struct ServerConfig {
        /// IP to bind: 127.0.0.1 = localhost only, 0.0.0.0 = all interfaces
        host: String = "127.0.0.1".to_string(),
        port: u16 = 6001,
    }
}

// ============================================================================
// HUB CONFIGURATION
// ============================================================================

config_struct! {
    /// Fan-out engine settings
    pub struct HubConfig {
        /// Channel-map shards per application (clamped to 1..=64)
        num_shards: usize = 32,

        /// Frames buffered per connection before writes fail as QueueFull
        connection_queue_size: usize = 100,

        /// Concurrent WebSocket connections accepted by this process
        max_connections: usize = 10_000,

        /// Handling of repeated names in a broadcast channel list
        duplicate_channels: DuplicatePolicy = DuplicatePolicy::Preserve,

        /// Applications allowed to publish/subscribe (empty = any)
        allowed_apps: Vec<String> = Vec::new(),

        // Protocol limits
        max_channel_length: usize = 256,
        max_event_length: usize = 64,
        max_data_size: usize = 256 * 1024,

        /// POST target for channel_occupied / channel_vacated (empty = disabled)
        webhook_url: String = String::new(),

        /// HMAC-SHA256 key for X-Pusher-Signature (empty = unsigned)
        webhook_secret: String = String::new(),

        webhook_timeout_secs: u64 = 5,
    }
}

impl HubConfig {
    /// Shard count after clamping into the supported range
    pub fn effective_shards(&self) -> usize {
        self.num_shards.clamp(1, 64)
    }
}

// ============================================================================
// WEBSOCKET CONFIGURATION
// ============================================================================

config_struct! {
    /// Per-socket keepalive behavior
    pub struct WebsocketConfig {
        /// Seconds of silence before the server pings (sent to clients as activity_timeout)
        activity_timeout_secs: u64 = 120,

        /// Seconds without any client traffic before disconnecting
        idle_timeout_secs: u64 = 150,

        /// Seconds to wait for a pong after a server ping
        pong_timeout_secs: u64 = 30,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration (data/config.toml)
    pub struct Config {
        server: ServerConfig = ServerConfig::default(),
        hub: HubConfig = HubConfig::default(),
        websocket: WebsocketConfig = WebsocketConfig::default(),
    }
}

impl Config {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hub = &self.hub;
        if hub.connection_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "hub.connection_queue_size must be greater than 0".to_string(),
            ));
        }
        if hub.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "hub.max_connections must be greater than 0".to_string(),
            ));
        }
        if hub.max_channel_length == 0 || hub.max_event_length == 0 || hub.max_data_size == 0 {
            return Err(ConfigError::Invalid(
                "hub protocol limits must be greater than 0".to_string(),
            ));
        }
        if !hub.webhook_url.is_empty()
            && !(hub.webhook_url.starts_with("http://") || hub.webhook_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "hub.webhook_url must be an http(s) URL, got '{}'",
                hub.webhook_url
            )));
        }
        if hub.webhook_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "hub.webhook_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.websocket.activity_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "websocket.activity_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
