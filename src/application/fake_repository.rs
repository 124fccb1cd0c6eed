// In-memory repository for service tests
use crate::application::readings_repository::{ReadingQuery, ReadingsRepository};
use crate::domain::reading::{Reading, Station};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeRepository {
    pub stations: Vec<Station>,
    pub readings: Vec<Reading>,
    pub fail_readings: bool,
    pub fail_stations: bool,
    pub queries: Mutex<Vec<ReadingQuery>>,
}

impl FakeRepository {
    pub fn with_readings(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            ..Default::default()
        }
    }

    pub fn last_query(&self) -> Option<ReadingQuery> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ReadingsRepository for FakeRepository {
    async fn list_stations(&self, params: &[(String, String)]) -> anyhow::Result<Vec<Station>> {
        if self.fail_stations {
            anyhow::bail!("station source unavailable");
        }
        let river = params
            .iter()
            .find(|(k, _)| k == "riverName")
            .map(|(_, v)| v.as_str());
        Ok(self
            .stations
            .iter()
            .filter(|s| river.is_none() || s.river_name.as_deref() == river)
            .cloned()
            .collect())
    }

    async fn get_station(&self, station_id: &str) -> anyhow::Result<Option<Station>> {
        if self.fail_stations {
            anyhow::bail!("station source unavailable");
        }
        Ok(self
            .stations
            .iter()
            .find(|s| s.station_reference == station_id)
            .cloned())
    }

    async fn fetch_readings(
        &self,
        _station_id: &str,
        query: &ReadingQuery,
    ) -> anyhow::Result<Vec<Reading>> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail_readings {
            anyhow::bail!("upstream returned 503");
        }
        Ok(self
            .readings
            .iter()
            .filter(|r| query.since.is_none_or(|since| r.date_time >= since))
            .cloned()
            .collect())
    }
}
