pub mod arguments;
pub mod config;
pub mod errors;
pub mod hub;
pub mod logger;

#[cfg(feature = "web")]
pub mod webserver;
