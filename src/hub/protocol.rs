/// Wire protocol constants (Pusher-style)
///
/// Event names, channel prefixes, close/error codes and the default size
/// limits shared by the engine and the WebSocket front end.
use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// EVENTS
// ============================================================================

// Client -> Server
pub const EVENT_PING: &str = "pusher:ping";
pub const EVENT_SUBSCRIBE: &str = "pusher:subscribe";
pub const EVENT_UNSUBSCRIBE: &str = "pusher:unsubscribe";

// Server -> Client
pub const EVENT_PONG: &str = "pusher:pong";
pub const EVENT_CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const EVENT_ERROR: &str = "pusher:error";
pub const EVENT_SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";

// ============================================================================
// CHANNELS
// ============================================================================

pub const CHANNEL_PREFIX_PRIVATE: &str = "private-";
pub const CHANNEL_PREFIX_PRESENCE: &str = "presence-";

/// Separator for multi-channel broadcast lists
pub const CHANNEL_LIST_DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Public,
    Private,
    Presence,
}

impl ChannelKind {
    pub fn of(channel: &str) -> Self {
        if channel.starts_with(CHANNEL_PREFIX_PRESENCE) {
            ChannelKind::Presence
        } else if channel.starts_with(CHANNEL_PREFIX_PRIVATE) {
            ChannelKind::Private
        } else {
            ChannelKind::Public
        }
    }

    /// Private and presence channels need a subscription signature
    pub fn requires_auth(&self) -> bool {
        !matches!(self, ChannelKind::Public)
    }
}

static VALID_CHANNEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-=@,.;]+$").expect("static channel regex"));

/// Check a client-supplied channel name (subscribe/unsubscribe)
pub fn is_valid_channel_name(name: &str, max_length: usize) -> bool {
    !name.is_empty() && name.len() <= max_length && VALID_CHANNEL_NAME.is_match(name)
}

// ============================================================================
// ERROR / CLOSE CODES
// ============================================================================

/// Binary frames are not supported
pub const ERROR_UNSUPPORTED_FRAME: u16 = 4003;
/// Connection limit reached
pub const ERROR_OVER_CAPACITY: u16 = 4100;
/// Generic error; the client may reconnect
pub const ERROR_GENERIC_RECONNECT: u16 = 4200;
/// No pong or other traffic within the keepalive window
pub const ERROR_PONG_TIMEOUT: u16 = 4201;
/// Subscription refused
pub const ERROR_SUBSCRIPTION_DENIED: u16 = 4009;
/// Application unknown or disabled
pub const ERROR_APPLICATION_UNKNOWN: u16 = 4001;

// ============================================================================
// LIMITS (defaults, overridable through HubConfig)
// ============================================================================

pub const MAX_CHANNEL_LENGTH: usize = 256;
pub const MAX_EVENT_LENGTH: usize = 64;
pub const MAX_DATA_SIZE: usize = 256 * 1024;
