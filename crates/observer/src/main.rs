//! `medval-observer` -- follow validation progress from the terminal.
//!
//! Connects to the server's live progress channel, logs every progress and
//! error event, and reconnects with a fixed delay when the connection
//! drops.
//!
//! # Environment variables
//!
//! | Variable                 | Default                  | Description                         |
//! |--------------------------|--------------------------|-------------------------------------|
//! | `OBSERVER_WS_URL`        | `ws://localhost:3001/ws` | Progress channel endpoint           |
//! | `RECONNECT_DELAY_MS`     | `2000`                   | Wait before each reconnect attempt  |
//! | `RECONNECT_MAX_ATTEMPTS` | `5`                      | Consecutive attempts before giving up |

use std::time::Duration;

use medval_core::events::JobEvent;
use medval_observer::client::ObserverClient;
use medval_observer::reconnect::ReconnectPolicy;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_WS_URL: &str = "ws://localhost:3001/ws";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medval_observer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ws_url = std::env::var("OBSERVER_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.into());

    let defaults = ReconnectPolicy::default();
    let delay_ms: u64 = std::env::var("RECONNECT_DELAY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.delay.as_millis() as u64);
    let max_attempts: u32 = std::env::var("RECONNECT_MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.max_attempts);

    let policy = ReconnectPolicy {
        delay: Duration::from_millis(delay_ms),
        max_attempts,
    };

    tracing::info!(ws_url = %ws_url, delay_ms, max_attempts, "Starting medval-observer");

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let client = ObserverClient::new(ws_url, policy);
    let result = client
        .run(&cancel, |event| match event {
            JobEvent::Progress { progress } => {
                tracing::info!(progress, "Validation progress");
            }
            JobEvent::Error { message } => {
                tracing::warn!(message = %message, "Validation error");
            }
            JobEvent::Log { text } => {
                tracing::debug!(text = %text, "Worker output");
            }
        })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Giving up");
        std::process::exit(1);
    }
}
