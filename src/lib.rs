pub mod client;
pub mod config;
pub mod display;
pub mod errors;
pub mod flight;
pub mod geo;
pub mod network;
pub mod opensky;
pub mod provider;
pub mod selector;
pub mod service;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_finder=info,flight_display=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
