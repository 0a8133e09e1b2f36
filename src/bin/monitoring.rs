//! monitoring: reading ingestion service
//!
//! Consumes device readings from RabbitMQ, records them with their hourly
//! rollup, and streams them to live WebSocket subscribers.
//!
//! ## Architecture
//! ```text
//! [RabbitMQ] -> [consumer thread] -> [Reading Store]
//!                      |
//!                      v (Bridge)
//!               [Broadcaster task] -> [WebSocket subscribers]
//!                                      [HTTP query] -> [Reading Store]
//! ```
//!
//! ## Configuration
//! - `--config <path>` or MONITORING_CONFIG: YAML configuration file
//! - MONITORING__*: overrides, e.g. MONITORING__SERVER__PORT=8080
//! - RABBITMQ_HOST, DB_HOST/DB_NAME/DB_USER/DB_PASS: legacy deployment settings
//! - MONITORING_LOG: tracing filter (default "info")

use std::future::IntoFuture;

use tokio::net::TcpListener;
use tracing::{error, info};

use monitoring::broadcast::{Bridge, Broadcaster};
use monitoring::bus::spawn_worker;
use monitoring::config::Config;
use monitoring::server::{router, AppState};
use monitoring::storage::init_storage;
use monitoring::utils::bootstrap::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = config_path_from_args();
    let config = Config::load(config_path.as_deref())?;

    info!("Starting monitoring service");

    // Delivery domain: broadcaster task and HTTP server share this runtime.
    let bridge = Bridge::new();
    let broadcaster = Broadcaster::new().start(&bridge);

    let store = init_storage(&config.storage).await?;

    let mut worker = spawn_worker(
        config.messaging.clone(),
        config.storage.clone(),
        bridge.clone(),
    )?;

    let state = AppState::new(store, bridge, config.broadcast.subscriber_buffer);
    let app = router(state);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, queue = %config.messaging.queue, "Monitoring service listening");

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server failed");
                return Err(e.into());
            }
        }
        failure = &mut worker.failure => {
            match failure {
                Ok(e) => {
                    error!(error = %e, "Consumer worker failed");
                    return Err(e.into());
                }
                Err(_) => {
                    error!("Consumer worker exited");
                    return Err("consumer worker exited".into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    broadcaster.abort();
    info!("Monitoring service stopped");
    Ok(())
}

/// Value of `--config <path>` or `--config=<path>`, if given.
fn config_path_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}
