/// Configuration system
///
/// - `macros`: the `config_struct!` declaration macro
/// - `schemas`: every config section with its defaults
/// - `utils`: loading, reloading and global access
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{Config, DuplicatePolicy, HubConfig, ServerConfig, WebsocketConfig};
pub use utils::{
    get_config_clone, is_config_initialized, load_config, load_config_from_path,
    read_config_file, reload_config_from_path, save_config, with_config, CONFIG,
    CONFIG_FILE_PATH,
};
