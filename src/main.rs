//! pointer-relay server entry point.
//!
//! Starts the hub and the Axum HTTP server with the WebSocket endpoint.

use tracing_subscriber::EnvFilter;

use pointer_relay::api;
use pointer_relay::app_state::AppState;
use pointer_relay::config::RelayConfig;
use pointer_relay::domain::Hub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting pointer-relay");

    // Start the hub before accepting connections
    let hub = Hub::spawn(config.hub_event_capacity);

    let app_state = AppState {
        hub,
        limits: config.session,
    };
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
