/// Shared application state for the webserver
///
/// Handed to every route handler and WebSocket task.
use std::sync::Arc;

use crate::config::WebsocketConfig;
use crate::hub::FanoutEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FanoutEngine>,

    /// Keepalive settings for new sockets
    pub websocket: Arc<WebsocketConfig>,

    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(engine: Arc<FanoutEngine>, websocket: WebsocketConfig) -> Self {
        Self {
            engine,
            websocket: Arc::new(websocket),
            startup_time: chrono::Utc::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.startup_time)
            .num_seconds()
            .max(0) as u64
    }
}
