// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

use crate::application::chart_service::ChartService;
use crate::application::station_service::StationService;
use crate::infrastructure::config::{load_app_config, load_chart_style};
use crate::infrastructure::ea_repository::EaRepository;
use crate::presentation::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let app_config = load_app_config()?;
    let chart_style = load_chart_style()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(EaRepository::new(
        app_config.upstream.base_url.clone(),
        Duration::from_secs(app_config.upstream.timeout_secs),
        Duration::from_secs(app_config.upstream.cache_ttl_secs),
    )?);

    // Create services (application layer)
    let station_service = StationService::new(repository.clone());
    let chart_service = ChartService::new(repository, chart_style, app_config.display.time_zone);

    let state = Arc::new(AppState {
        station_service,
        chart_service,
    });

    // Build router (presentation layer)
    let router = presentation::router(state);

    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind))?;
    tracing::info!(
        "Starting river-level-charts on {} (upstream {})",
        addr,
        app_config.upstream.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
