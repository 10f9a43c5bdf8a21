mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::place::PlaceError;

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/reverse", get(handlers::reverse))
        .route("/api/discover", get(handlers::discover_area))
        .route("/api/suggest", get(handlers::suggestions))
        .route("/api/current", get(handlers::current).delete(handlers::close_current))
        .route("/api/current/save", post(handlers::save_current))
        .route("/api/places", get(handlers::list_places).post(handlers::add_place))
        .route("/api/places/reorder", post(handlers::reorder_places))
        .route("/api/places/{id}", axum::routing::delete(handlers::remove_place))
        .route("/api/places/{id}/visited", post(handlers::toggle_visited))
        .route("/api/places/{id}/rating", post(handlers::rate_place))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, state: Arc<AppState>) -> Result<(), PlaceError> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "server listening");
    eprintln!("  placefinder server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await?;
    Ok(())
}
