use super::schemas::Config;
/// Configuration utilities - loading, reloading, and access helpers
///
/// - Loading configuration from disk (defaults when the file is missing)
/// - Hot-reloading configuration at runtime
/// - Thread-safe access helpers
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

/// Global configuration instance
///
/// Read it through `with_config` / `get_config_clone`. Until a file is
/// loaded it holds the schema defaults.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

fn config_cell() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Load configuration from the default path
pub fn load_config() -> Result<(), ConfigError> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Load configuration from a specific file path
///
/// A missing file is not an error: defaults are used and a warning logged.
/// The loaded configuration is validated before it replaces the global one.
pub fn load_config_from_path(path: &str) -> Result<(), ConfigError> {
    let config = if Path::new(path).exists() {
        read_config_file(path)?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        Config::default()
    };

    config.validate()?;
    *config_cell().write() = config;

    logger::debug(LogTag::Config, &format!("Configuration loaded from '{}'", path));
    Ok(())
}

/// Reload configuration from a specific file path
///
/// Unlike `load_config_from_path`, the file must exist. The previous
/// configuration stays active if reading or validation fails.
pub fn reload_config_from_path(path: &str) -> Result<(), ConfigError> {
    let config_lock = CONFIG.get().ok_or(ConfigError::NotInitialized)?;
    let new_config = read_config_file(path)?;
    new_config.validate()?;

    *config_lock.write() = new_config;
    logger::info(LogTag::Config, &format!("Configuration reloaded from '{}'", path));
    Ok(())
}

/// Parse a TOML file into a `Config`
pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    toml::from_str::<Config>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Execute a function with read access to the configuration
///
/// # Example
/// ```
/// use channelcast::config::with_config;
///
/// let port = with_config(|cfg| cfg.server.port);
/// assert!(port > 0);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config = config_cell().read();
    f(&config)
}

/// Get a clone of the entire configuration
///
/// Useful when values must be held across await points.
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Save the current configuration to disk
pub fn save_config(path: Option<&str>) -> Result<(), ConfigError> {
    let path = path.unwrap_or(CONFIG_FILE_PATH);
    let config_str = with_config(|cfg| toml::to_string_pretty(cfg))?;

    std::fs::write(path, config_str).map_err(|source| ConfigError::Write {
        path: path.to_string(),
        source,
    })
}

/// Check if configuration has been initialized
pub fn is_config_initialized() -> bool {
    CONFIG.get().is_some()
}
