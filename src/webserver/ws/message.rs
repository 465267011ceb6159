/// WebSocket message schema (Pusher-style)
///
/// Client frames are `{"event": "...", "data": ..., "channel": ...}`. For
/// subscribe/unsubscribe the channel normally sits in `data.channel`; some
/// clients send `data` as a JSON-encoded string, so both are accepted.
///
/// Server control frames are built with `encode_control` and carry `data`
/// as a JSON-encoded string.
use serde::Deserialize;
use serde_json::json;

use crate::hub::{encode_control, protocol, Frame};

// ============================================================================
// CLIENT -> SERVER
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub event: String,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// What a client frame asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Ping,
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    /// Subscribe/unsubscribe without a channel
    MissingChannel { event: String },
    /// Client events and anything else the server does not act on
    Unsupported { event: String },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Channel named by the message, wherever the client put it
    pub fn channel_name(&self) -> Option<String> {
        let from_data = match &self.data {
            serde_json::Value::Object(map) => map
                .get("channel")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            serde_json::Value::String(encoded) => {
                serde_json::from_str::<serde_json::Value>(encoded)
                    .ok()
                    .and_then(|v| v.get("channel").and_then(|c| c.as_str()).map(str::to_string))
            }
            _ => None,
        };
        from_data.or_else(|| self.channel.clone())
    }

    pub fn command(&self) -> ClientCommand {
        match self.event.as_str() {
            protocol::EVENT_PING => ClientCommand::Ping,
            protocol::EVENT_SUBSCRIBE => match self.channel_name() {
                Some(channel) => ClientCommand::Subscribe { channel },
                None => ClientCommand::MissingChannel {
                    event: self.event.clone(),
                },
            },
            protocol::EVENT_UNSUBSCRIBE => match self.channel_name() {
                Some(channel) => ClientCommand::Unsubscribe { channel },
                None => ClientCommand::MissingChannel {
                    event: self.event.clone(),
                },
            },
            other => ClientCommand::Unsupported {
                event: other.to_string(),
            },
        }
    }
}

// ============================================================================
// SERVER -> CLIENT
// ============================================================================

pub fn connection_established(socket_id: &str, activity_timeout: u64) -> Result<Frame, serde_json::Error> {
    encode_control(
        protocol::EVENT_CONNECTION_ESTABLISHED,
        None,
        &json!({
            "socket_id": socket_id,
            "activity_timeout": activity_timeout,
        }),
    )
}

pub fn pong() -> Result<Frame, serde_json::Error> {
    encode_control(protocol::EVENT_PONG, None, &json!({}))
}

pub fn subscription_succeeded(channel: &str) -> Result<Frame, serde_json::Error> {
    encode_control(protocol::EVENT_SUBSCRIPTION_SUCCEEDED, Some(channel), &json!({}))
}

pub fn error(code: u16, message: &str) -> Result<Frame, serde_json::Error> {
    encode_control(
        protocol::EVENT_ERROR,
        None,
        &json!({
            "code": code,
            "message": message,
        }),
    )
}

/// Pusher-style socket id: two random numeric parts joined by a dot
pub fn generate_socket_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    format!(
        "{}.{}",
        rng.gen_range(1..1_000_000_000u64),
        rng.gen_range(1..1_000_000_000u64)
    )
}
