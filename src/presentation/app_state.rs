// Application state for HTTP handlers
use crate::application::chart_service::ChartService;
use crate::application::station_service::StationService;

#[derive(Clone)]
pub struct AppState {
    pub station_service: StationService,
    pub chart_service: ChartService,
}
