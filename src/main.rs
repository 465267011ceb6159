use anyhow::Context;
use std::sync::Arc;

use channelcast::{
    arguments::{
        get_config_path, get_host_override, get_port_override, is_privileged_port, patterns,
        print_debug_info, print_help, validate_port_argument,
    },
    config,
    hub::FanoutEngine,
    logger::{self, LogTag},
    webserver::{self, AppState},
};

/// Main entry point for channelcast
///
/// Loads configuration, builds the fan-out engine, serves HTTP + WebSocket
/// until Ctrl-C / SIGTERM, then shuts the engine down.
#[tokio::main]
async fn main() {
    logger::init();

    if patterns::is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    if patterns::is_version_requested() {
        println!("channelcast {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    logger::info(LogTag::System, "channelcast starting up...");
    print_debug_info();

    match run().await {
        Ok(()) => logger::info(LogTag::System, "channelcast stopped"),
        Err(e) => {
            logger::error(LogTag::System, &format!("channelcast failed: {:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<()> {
    validate_port_argument().map_err(anyhow::Error::msg)?;

    let path = get_config_path().unwrap_or_else(|| config::CONFIG_FILE_PATH.to_string());
    config::load_config_from_path(&path)
        .with_context(|| format!("Failed to load configuration from '{}'", path))?;

    let mut cfg = config::get_config_clone();

    if let Some(port) = get_port_override() {
        if is_privileged_port(port) {
            logger::warning(
                LogTag::System,
                &format!("Port {} requires elevated privileges (root/Administrator)", port),
            );
        }
        logger::info(LogTag::System, &format!("CLI override: Using port {}", port));
        cfg.server.port = port;
    }

    if let Some(host) = get_host_override() {
        logger::info(LogTag::System, &format!("CLI override: Using host {}", host));
        if host == "0.0.0.0" {
            logger::warning(
                LogTag::System,
                "Binding to 0.0.0.0 allows remote access - ensure firewall is configured",
            );
        }
        cfg.server.host = host;
    }

    let engine = Arc::new(FanoutEngine::new(cfg.hub.clone()));
    let state = Arc::new(AppState::new(Arc::clone(&engine), cfg.websocket.clone()));

    let signal_engine = Arc::clone(&engine);
    ctrlc::set_handler(move || {
        logger::info(LogTag::System, "Received shutdown signal, stopping...");
        webserver::shutdown();
        // Upgraded sockets outlive the HTTP server; closing the engine ends them
        signal_engine.shutdown();
    })
    .context("Failed to install signal handler")?;

    webserver::start_server(state, &cfg.server)
        .await
        .map_err(anyhow::Error::msg)?;

    engine.shutdown();
    Ok(())
}
