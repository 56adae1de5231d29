//! `LanChat` relay server.
//!
//! Listens for participant WebSocket connections and routes text packets
//! between them: private, group, and broadcast.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin lanchat-relay
//!
//! # Run on custom address with a named relay endpoint
//! cargo run --bin lanchat-relay -- --bind 127.0.0.1:8080 --endpoint relay-01
//!
//! # Or via environment variables
//! LANCHAT_ADDR=127.0.0.1:8080 LANCHAT_LOG=debug cargo run --bin lanchat-relay
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use lanchat_relay::config::{RelayCliArgs, RelayConfig};
use lanchat_relay::registry::Registry;
use lanchat_relay::service::RelayService;
use lanchat_relay::transport::ws::WsTransport;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Held until exit so buffered log lines are flushed.
    let _log_guard = init_tracing(&config.log_level, config.log_file.as_deref());

    tracing::info!(addr = %config.bind_addr, endpoint = %config.endpoint, "starting lanchat relay");

    let (transport, bound_addr, server) = match WsTransport::bind(&config.bind_addr).await {
        Ok(bound) => bound,
        Err(e) => {
            tracing::error!(error = %e, "failed to start websocket listener");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bound_addr, "relay listening");

    let transport = Arc::new(transport);
    let service = RelayService::new(
        Arc::clone(&transport),
        Arc::new(Registry::new()),
        config.service(),
    );

    let stop = service.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            stop.shutdown();
        }
    });

    let result = service.run().await;
    transport.close_all().await;
    server.abort();

    match result {
        Ok(reason) => tracing::info!(reason = ?reason, "relay stopped"),
        Err(e) => {
            tracing::error!(error = %e, "relay terminated abnormally");
            std::process::exit(1);
        }
    }
}

/// Installs the global subscriber, logging to `log_file` when given.
///
/// `RUST_LOG` takes precedence over `level`.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(path) = log_file else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map_or_else(|| "lanchat-relay.log".into(), |n| n.to_os_string());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
