//! `HandUp` server -- community task-matching board.
//!
//! An axum HTTP + WebSocket server: users post help requests, claim and
//! complete each other's tasks, and every connected client sees lifecycle
//! changes pushed in real time.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:5000
//! cargo run --bin handup-server
//!
//! # Run on custom address with a real signing secret
//! HANDUP_JWT_SECRET=... cargo run --bin handup-server -- --bind 127.0.0.1:8080
//! ```

use clap::Parser;
use handup_server::config::{ServerCliArgs, ServerConfig};
use handup_server::server;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if config.uses_dev_secret() {
        tracing::warn!("no JWT secret configured, using the development default");
    }

    tracing::info!(addr = %config.bind_addr, "starting handup server");

    let state = server::build_state(&config);

    match server::start_server(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "handup server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}
