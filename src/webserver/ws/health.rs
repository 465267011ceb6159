/// WebSocket keepalive tracking
///
/// The server pings after `activity_timeout` of client silence and drops the
/// socket when a ping goes unanswered or nothing arrives for `idle_timeout`.
use std::time::{Duration, Instant};

use crate::config::WebsocketConfig;

#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Silence before the server pings
    pub activity_timeout: Duration,

    /// Silence before the socket is dropped
    pub idle_timeout: Duration,

    /// Time allowed for a pong after a server ping
    pub pong_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self::from(&WebsocketConfig::default())
    }
}

impl From<&WebsocketConfig> for HealthConfig {
    fn from(config: &WebsocketConfig) -> Self {
        Self {
            activity_timeout: Duration::from_secs(config.activity_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs),
        }
    }
}

/// Per-socket health state
#[derive(Debug)]
pub struct ConnectionHealth {
    last_activity: Instant,
    last_ping: Option<Instant>,
    config: HealthConfig,
}

impl ConnectionHealth {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            last_activity: Instant::now(),
            last_ping: None,
            config,
        }
    }

    /// Any client frame counts as activity and answers a pending ping
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.last_ping = None;
    }

    pub fn record_ping(&mut self) {
        self.last_ping = Some(Instant::now());
    }

    pub fn is_idle(&self) -> bool {
        self.last_activity.elapsed() > self.config.idle_timeout
    }

    pub fn is_pong_overdue(&self) -> bool {
        self.last_ping
            .map(|sent| sent.elapsed() > self.config.pong_timeout)
            .unwrap_or(false)
    }

    pub fn needs_ping(&self) -> bool {
        self.last_ping.is_none() && self.last_activity.elapsed() > self.config.activity_timeout
    }

    pub fn seconds_since_activity(&self) -> u64 {
        self.last_activity.elapsed().as_secs()
    }
}
