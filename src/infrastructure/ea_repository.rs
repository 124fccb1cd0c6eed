// Flood-monitoring REST API repository implementation
use crate::application::readings_repository::{ReadingQuery, ReadingsRepository};
use crate::domain::reading::{MeasureRef, Reading, Station};
use crate::infrastructure::response_cache::ResponseCache;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub struct EaRepository {
    base_url: String,
    client: reqwest::Client,
    cache: ResponseCache,
}

/// Envelope shared by the station and reading list endpoints.
#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<Value>,
}

impl EaRepository {
    pub fn new(base_url: String, timeout: Duration, cache_ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache: ResponseCache::new(cache_ttl),
        })
    }

    fn build_url(&self, path: &str, params: &[(String, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    async fn fetch_items(&self, url: &str) -> Result<Vec<Value>> {
        let body = match self.cache.get(url).await {
            Some(body) => {
                tracing::debug!("Cache hit for {}", url);
                body
            }
            None => {
                let response = self
                    .client
                    .get(url)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .context("Failed to send request to flood-monitoring API")?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    anyhow::bail!(
                        "Flood-monitoring request failed with status {}: {}",
                        status,
                        body
                    );
                }

                let body = response
                    .bytes()
                    .await
                    .context("Failed to read flood-monitoring response")?;
                self.cache.insert(url.to_string(), body.clone()).await;
                body
            }
        };

        let data: ItemsResponse =
            serde_json::from_slice(&body).context("Failed to parse flood-monitoring response")?;
        Ok(data.items)
    }
}

#[async_trait]
impl ReadingsRepository for EaRepository {
    async fn list_stations(&self, params: &[(String, String)]) -> Result<Vec<Station>> {
        let url = self.build_url("/id/stations", params);
        let items = self.fetch_items(&url).await?;

        let stations: Vec<Station> = items.iter().filter_map(Station::from_value).collect();
        if stations.len() < items.len() {
            tracing::warn!(
                "Skipped {} station records without a station reference",
                items.len() - stations.len()
            );
        }
        Ok(stations)
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<Station>> {
        let params = [("stationReference".to_string(), station_id.to_string())];
        let stations = self.list_stations(&params).await?;
        Ok(stations.into_iter().next())
    }

    async fn fetch_readings(&self, station_id: &str, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let path = format!("/id/stations/{}/readings", urlencoding::encode(station_id));
        let url = self.build_url(&path, &query.to_params());
        let items = self.fetch_items(&url).await?;

        let readings: Vec<Reading> = items.iter().filter_map(parse_reading).collect();
        if readings.len() < items.len() {
            tracing::warn!(
                "Dropped {} malformed readings for station {}",
                items.len() - readings.len(),
                station_id
            );
        }

        tracing::debug!("Got {} readings for station {}", readings.len(), station_id);
        Ok(readings)
    }
}

/// Parse one reading record. Records without a parseable timestamp or a
/// numeric value are skipped.
fn parse_reading(item: &Value) -> Option<Reading> {
    let date_time = item
        .get("dateTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
        .with_timezone(&Utc);

    let value = match item.get("value")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };

    let measure = item.get("measure").and_then(MeasureRef::from_value);
    Some(Reading::new(date_time, value, measure))
}
