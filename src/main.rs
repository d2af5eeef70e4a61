use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use flight_finder::config::ServiceConfig;
use flight_finder::opensky::OpenSkyProvider;
use flight_finder::service::{AppState, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    flight_finder::init_tracing();
    let config = ServiceConfig::parse();

    let provider = OpenSkyProvider::new(
        &config.opensky_url,
        &config.adsbdb_url,
        Duration::from_secs(config.timeout_secs),
    )?;
    if config.api_key.is_none() {
        warn!("no SERVICE_API_KEY set, /closest-flight is open to everyone");
    }
    let app = router(AppState::new(Arc::new(provider), config.api_key));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
