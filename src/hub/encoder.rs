/// Event encoder
///
/// Turns an (event name, payload) pair into the text frame pushed to every
/// subscriber. Encoding is pure: the same inputs always give byte-identical
/// output, so one frame is built per publish and shared by all subscribers.
///
/// Wire shape: `{"event":"<name>","data":"<payload>"}`. The payload is an
/// opaque string; it is carried as a JSON string and never parsed.
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::HubConfig;
use crate::errors::FanoutError;

use super::protocol;

// ============================================================================
// FRAME
// ============================================================================

/// Encoded wire frame, cheap to clone across subscribers
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Arc<str>);

impl Frame {
    pub fn from_text(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.as_str())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Field order here is the field order on the wire.
#[derive(Serialize)]
struct EventFrame<'a> {
    event: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct ControlFrame<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    data: String,
}

// ============================================================================
// LIMITS
// ============================================================================

/// Size limits applied before anything is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    pub max_channel_length: usize,
    pub max_event_length: usize,
    pub max_data_size: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_channel_length: protocol::MAX_CHANNEL_LENGTH,
            max_event_length: protocol::MAX_EVENT_LENGTH,
            max_data_size: protocol::MAX_DATA_SIZE,
        }
    }
}

impl From<&HubConfig> for PayloadLimits {
    fn from(config: &HubConfig) -> Self {
        Self {
            max_channel_length: config.max_channel_length,
            max_event_length: config.max_event_length,
            max_data_size: config.max_data_size,
        }
    }
}

// ============================================================================
// ENCODER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct EventEncoder {
    limits: PayloadLimits,
}

impl EventEncoder {
    pub fn new(limits: PayloadLimits) -> Self {
        Self { limits }
    }

    /// Encode `{event, data}` into a frame
    pub fn encode(&self, event: &str, data: &str) -> Result<Frame, FanoutError> {
        serde_json::to_string(&EventFrame { event, data })
            .map(Frame::from_text)
            .map_err(|e| FanoutError::StructuralFailure(format!("frame encoding failed: {}", e)))
    }

    /// Check event name and payload against the configured limits
    ///
    /// Names are opaque: only their length is checked, so an empty name is
    /// accepted.
    pub fn validate_event(&self, event: &str, data: &str) -> Result<(), FanoutError> {
        if event.len() > self.limits.max_event_length {
            return Err(FanoutError::EventRejected {
                event: truncate_for_log(event),
                reason: format!(
                    "event name too long ({} > {})",
                    event.len(),
                    self.limits.max_event_length
                ),
            });
        }
        if data.len() > self.limits.max_data_size {
            return Err(FanoutError::EventRejected {
                event: event.to_string(),
                reason: format!(
                    "data payload too large ({} > {})",
                    data.len(),
                    self.limits.max_data_size
                ),
            });
        }
        Ok(())
    }

    /// Check a publish target channel name against the length limit
    pub fn validate_channel(&self, channel: &str) -> Result<(), FanoutError> {
        if channel.len() > self.limits.max_channel_length {
            return Err(FanoutError::ChannelRejected {
                channel: truncate_for_log(channel),
                reason: format!(
                    "channel name too long ({} > {})",
                    channel.len(),
                    self.limits.max_channel_length
                ),
            });
        }
        Ok(())
    }
}

/// Encode a protocol control message
///
/// `data` is serialized to JSON and carried as a string, matching how
/// Pusher clients expect `pusher:*` payloads.
pub fn encode_control(
    event: &str,
    channel: Option<&str>,
    data: &serde_json::Value,
) -> Result<Frame, serde_json::Error> {
    let data = serde_json::to_string(data)?;
    serde_json::to_string(&ControlFrame { event, channel, data }).map(Frame::from_text)
}

fn truncate_for_log(value: &str) -> String {
    const MAX: usize = 64;
    if value.len() <= MAX {
        return value.to_string();
    }
    let mut end = MAX;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
