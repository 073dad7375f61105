use std::sync::Arc;
use warp::Filter;

use super::websocket;
use crate::rating::RatingServer;

/// Creates the WebSocket route for all room traffic.
///
/// The `RatingServer` is constructed in `main` and injected here so its
/// lifecycle is owned at the top of the process, not inside the filter.
pub fn websocket_route(
    server: Arc<RatingServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(with_server(server))
        .map(|ws: warp::ws::Ws, server: Arc<RatingServer>| {
            ws.on_upgrade(move |websocket| websocket::handle_websocket(websocket, server))
        })
}

pub fn health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "service": "Pulse Server",
            "version": "0.1.0"
        }))
    })
}

fn with_server(
    server: Arc<RatingServer>,
) -> impl Filter<Extract = (Arc<RatingServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || server.clone())
}
