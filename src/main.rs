mod api;
mod config;
mod error;
mod rating;

use std::sync::Arc;

use warp::Filter;

use config::Config;
use rating::RatingServer;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pulse_server=info")),
        )
        .init();

    let server = Arc::new(RatingServer::new());

    let routes = api::routes::websocket_route(server).or(api::routes::health_check());

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Pulse server listening"
    );

    warp::serve(routes).run(config.bind_address()).await;
}
