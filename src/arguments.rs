/// Centralized argument handling for channelcast
///
/// Command-line flags are read once into a global vector and queried through
/// small helper functions, so any module can check a debug flag without
/// threading arguments through constructors.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Logging flags (--verbose, --quiet, --debug-<tag>)
/// - Listener overrides (--host, --port)
/// - `--flag value` lookups (e.g. `--config data/config.toml`)
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::env;

/// Global command-line arguments storage
/// Thread-safe singleton that stores arguments for access throughout the application
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    *CMD_ARGS.lock() = args;
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.lock().clone()
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .filter(|value| !value.starts_with("--"))
        .cloned()
}

// =============================================================================
// LOGGING FLAGS
// =============================================================================

/// Global verbose mode
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

/// Quiet mode - only warnings and errors
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// Config file path override
pub fn get_config_path() -> Option<String> {
    get_arg_value("--config")
}

// =============================================================================
// LISTENER OVERRIDES
// =============================================================================

/// `--port <n>` override for `[server] port`
pub fn get_port_override() -> Option<u16> {
    get_arg_value("--port").and_then(|value| value.parse().ok())
}

/// `--host <ip>` override for `[server] host`
pub fn get_host_override() -> Option<String> {
    get_arg_value("--host")
}

/// Reject a `--port` flag whose value is missing or not a valid port
pub fn validate_port_argument() -> Result<(), String> {
    if !has_arg("--port") {
        return Ok(());
    }
    match get_arg_value("--port") {
        None => Err("--port requires a value".to_string()),
        Some(value) => match value.parse::<u16>() {
            Ok(0) => Err("--port must be between 1 and 65535".to_string()),
            Ok(_) => Ok(()),
            Err(_) => Err(format!("--port value '{}' is not a valid port", value)),
        },
    }
}

/// Ports below 1024 need elevated privileges on most systems
pub fn is_privileged_port(port: u16) -> bool {
    port < 1024
}

// =============================================================================
// HELP SYSTEM
// =============================================================================

/// Displays the help menu with all available flags and their descriptions
pub fn print_help() {
    println!("channelcast - multi-tenant channel fan-out hub");
    println!();
    println!("USAGE:");
    println!("    channelcast [FLAGS]");
    println!();
    println!("CORE FLAGS:");
    println!("    --config <path>           Config file (default: data/config.toml)");
    println!("    --host <ip>               Override [server] host");
    println!("    --port <n>                Override [server] port");
    println!("    --help, -h                Show this help message");
    println!("    --version, -V             Show version");
    println!("    --quiet                   Only log warnings and errors");
    println!("    --verbose                 Enable verbose logging for every module");
    println!();
    println!("DEBUG FLAGS:");
    println!("    --debug-hub               Registry, publish and broadcast debug mode");
    println!("    --debug-webserver         HTTP routes debug mode");
    println!("    --debug-websocket         WebSocket protocol debug mode");
    println!("    --debug-webhook           Channel lifecycle webhook delivery");
    println!("    --debug-<tag>             Debug mode for any log tag (e.g. --debug-registry)");
    println!();
    println!("EXAMPLES:");
    println!("    channelcast                                  # Start with data/config.toml");
    println!("    channelcast --config /etc/channelcast.toml   # Start with a custom config");
    println!("    channelcast --debug-hub --debug-websocket    # Trace fan-out and sockets");
}

/// Gets a list of all enabled debug modes (every `--debug-<name>` flag)
pub fn get_enabled_debug_modes() -> Vec<String> {
    get_cmd_args()
        .iter()
        .filter_map(|arg| arg.strip_prefix("--debug-"))
        .map(|mode| mode.to_string())
        .collect()
}

/// Prints debug information about enabled modes
pub fn print_debug_info() {
    let enabled_modes = get_enabled_debug_modes();
    if enabled_modes.is_empty() {
        println!("No debug modes enabled");
    } else {
        println!("Enabled debug modes: {:?}", enabled_modes);
    }
}

/// Common argument parsing patterns
pub mod patterns {
    use super::*;

    /// Checks for help flags
    pub fn is_help_requested() -> bool {
        has_arg("--help") || has_arg("-h")
    }

    /// Checks for version flags
    pub fn is_version_requested() -> bool {
        has_arg("--version") || has_arg("-V")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // CMD_ARGS is process-global; keep every assertion that mutates it in one test.
    #[test]
    fn test_argument_helpers() {
        set_cmd_args(vec![
            "channelcast".to_string(),
            "--debug-hub".to_string(),
            "--config".to_string(),
            "custom.toml".to_string(),
            "--debug-registry".to_string(),
            "--port".to_string(),
        ]);

        assert!(has_arg("--debug-hub"));
        assert!(!has_arg("--debug-webserver"));
        assert_eq!(get_config_path(), Some("custom.toml".to_string()));
        assert_eq!(get_arg_value("--port"), None);
        assert!(validate_port_argument().is_err());
        assert_eq!(
            get_enabled_debug_modes(),
            vec!["hub".to_string(), "registry".to_string()]
        );

        set_cmd_args(vec![
            "channelcast".to_string(),
            "--port".to_string(),
            "7001".to_string(),
            "--host".to_string(),
            "0.0.0.0".to_string(),
        ]);
        assert!(validate_port_argument().is_ok());
        assert_eq!(get_port_override(), Some(7001));
        assert_eq!(get_host_override(), Some("0.0.0.0".to_string()));
        assert!(!is_privileged_port(7001));

        set_cmd_args(vec!["channelcast".to_string()]);
        assert!(get_enabled_debug_modes().is_empty());
        assert!(validate_port_argument().is_ok());
    }
}
