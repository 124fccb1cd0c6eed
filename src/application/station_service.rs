// Station service - Use cases for station lookup and raw readings
use crate::application::readings_repository::{ReadingQuery, ReadingsRepository};
use crate::domain::reading::{Reading, Station};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Query parameters accepted by the raw readings passthrough.
#[derive(Debug, Clone, Default)]
pub struct RawReadingsRequest {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    /// Every other parameter, forwarded upstream verbatim.
    pub params: Vec<(String, String)>,
}

impl RawReadingsRequest {
    /// Whether the caller already picked the upstream's own day filters.
    fn selects_day(&self) -> bool {
        self.params.iter().any(|(k, _)| k == "today" || k == "date")
    }
}

#[derive(Clone)]
pub struct StationService {
    repository: Arc<dyn ReadingsRepository>,
}

impl StationService {
    pub fn new(repository: Arc<dyn ReadingsRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_stations(&self, params: &[(String, String)]) -> anyhow::Result<Vec<Station>> {
        self.repository.list_stations(params).await
    }

    pub async fn get_station(&self, station_id: &str) -> anyhow::Result<Option<Station>> {
        self.repository.get_station(station_id).await
    }

    /// Readings for a station, oldest first. Without `since`, `today` or
    /// `date`, the last 24 hours are returned.
    pub async fn station_readings(
        &self,
        station_id: &str,
        request: &RawReadingsRequest,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Reading>> {
        let mut query = ReadingQuery {
            since: request.since,
            limit: request.limit,
            extra: request.params.clone(),
        };
        if query.since.is_none() && !request.selects_day() {
            query.since = Some(now - Duration::hours(24));
        }

        let mut readings = self.repository.fetch_readings(station_id, &query).await?;
        readings.sort_by_key(|r| r.date_time);

        tracing::debug!(
            "Fetched {} raw readings for station {}",
            readings.len(),
            station_id
        );
        Ok(readings)
    }
}
