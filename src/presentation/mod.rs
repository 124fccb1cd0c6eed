// Presentation layer - HTTP routes and handlers
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_station, health_check, list_stations, station_chart, station_readings,
};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/stations", get(list_stations))
        .route("/api/stations/:id", get(get_station))
        .route("/api/stations/:id/readings", get(station_readings))
        .route("/api/stations/:id/chart", get(station_chart))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
