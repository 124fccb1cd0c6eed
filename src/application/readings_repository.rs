// Repository trait for station and reading data access
use crate::domain::reading::{Reading, Station};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

/// Parameters for one upstream readings request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingQuery {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    /// Other filters forwarded verbatim (e.g. `today`, `date`).
    pub extra: Vec<(String, String)>,
}

impl ReadingQuery {
    pub fn since(since: DateTime<Utc>, limit: usize) -> Self {
        Self {
            since: Some(since),
            limit: Some(limit),
            extra: Vec::new(),
        }
    }

    /// Upstream query parameters. Results are always requested sorted.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(since) = self.since {
            params.push((
                "since".to_string(),
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if let Some(limit) = self.limit {
            params.push(("_limit".to_string(), limit.to_string()));
        }
        params.extend(self.extra.iter().cloned());
        params.push(("_sorted".to_string(), String::new()));
        params
    }
}

#[async_trait]
pub trait ReadingsRepository: Send + Sync {
    /// List stations, filtered by upstream query parameters
    async fn list_stations(&self, params: &[(String, String)]) -> anyhow::Result<Vec<Station>>;

    /// Look up a single station by its station reference
    async fn get_station(&self, station_id: &str) -> anyhow::Result<Option<Station>>;

    /// Fetch readings for a station. Malformed records are dropped, not errors.
    async fn fetch_readings(
        &self,
        station_id: &str,
        query: &ReadingQuery,
    ) -> anyhow::Result<Vec<Reading>>;
}
