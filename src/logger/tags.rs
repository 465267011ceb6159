/// Log tags identify the subsystem a message comes from
///
/// Each tag maps to a `--debug-<key>` / `--verbose-<key>` flag pair and to a
/// fixed-width, colored label in console output.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Hub,
    Registry,
    Publish,
    Broadcast,
    Reporter,
    Webhook,
    Webserver,
    Websocket,
    External,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug-<key>` and `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Hub => "hub".to_string(),
            LogTag::Registry => "registry".to_string(),
            LogTag::Publish => "publish".to_string(),
            LogTag::Broadcast => "broadcast".to_string(),
            LogTag::Reporter => "reporter".to_string(),
            LogTag::Webhook => "webhook".to_string(),
            LogTag::Webserver => "webserver".to_string(),
            LogTag::Websocket => "websocket".to_string(),
            LogTag::External => "external".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Engine tags also respond to the umbrella `--debug-hub` flag
    pub fn is_hub_component(&self) -> bool {
        matches!(
            self,
            LogTag::Registry | LogTag::Publish | LogTag::Broadcast | LogTag::Reporter
        )
    }

    /// Uppercase label without color codes (file output, tests)
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::Hub => "HUB".to_string(),
            LogTag::Registry => "REGISTRY".to_string(),
            LogTag::Publish => "PUBLISH".to_string(),
            LogTag::Broadcast => "BROADCAST".to_string(),
            LogTag::Reporter => "REPORTER".to_string(),
            LogTag::Webhook => "WEBHOOK".to_string(),
            LogTag::Webserver => "WEBSERVER".to_string(),
            LogTag::Websocket => "WS".to_string(),
            LogTag::External => "EXTERNAL".to_string(),
            LogTag::Other(name) => name.to_uppercase(),
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
