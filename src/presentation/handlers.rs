// HTTP request handlers
use crate::application::chart_service::{ChartError, ChartRequest, DetailRequest};
use crate::application::station_service::RawReadingsRequest;
use crate::domain::window::{CustomRange, RangeMode};
use crate::infrastructure::config::DisplayZone;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Trailing detail window used by `detail=trailing24h`.
const TRAILING_DETAIL_HOURS: i64 = 24;

#[derive(Serialize)]
struct Items<T> {
    items: Vec<T>,
}

/// A query parameter that could not be interpreted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid timestamp for {name}: {value}")]
    InvalidTimestamp { name: String, value: String },
    #[error("invalid _limit: {0}")]
    InvalidLimit(String),
}

/// Non-empty value of a query parameter.
fn param<'a>(params: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn timestamp_param(
    params: &BTreeMap<String, String>,
    name: &str,
    zone: DisplayZone,
) -> Result<Option<DateTime<Utc>>, QueryError> {
    param(params, name)
        .map(|value| {
            zone.parse_timestamp(value)
                .ok_or_else(|| QueryError::InvalidTimestamp {
                    name: name.to_string(),
                    value: value.to_string(),
                })
        })
        .transpose()
}

/// Raw readings request from the query string. `since` and `_limit` are
/// checked here; everything else is passed through for the upstream.
pub fn readings_request(
    params: BTreeMap<String, String>,
    zone: DisplayZone,
) -> Result<RawReadingsRequest, QueryError> {
    let since = timestamp_param(&params, "since", zone)?;
    let limit = param(&params, "_limit")
        .map(|value| {
            value
                .parse::<usize>()
                .map_err(|_| QueryError::InvalidLimit(value.to_string()))
        })
        .transpose()?;

    Ok(RawReadingsRequest {
        since,
        limit,
        params: params
            .into_iter()
            .filter(|(k, _)| k != "since" && k != "_limit")
            .collect(),
    })
}

/// Chart request from the query string (`range`, `start`, `end`,
/// `detailStart`, `detailEnd`, `detail`).
pub fn chart_request(
    params: &BTreeMap<String, String>,
    zone: DisplayZone,
) -> Result<ChartRequest, QueryError> {
    let start = timestamp_param(params, "start", zone)?;
    let end = timestamp_param(params, "end", zone)?;
    let detail_start = timestamp_param(params, "detailStart", zone)?;
    let detail_end = timestamp_param(params, "detailEnd", zone)?;

    let custom = match (start, end) {
        (Some(start), Some(end)) => Some(CustomRange { start, end }),
        _ => None,
    };

    let detail = if detail_start.is_some() || detail_end.is_some() {
        DetailRequest::Bounds {
            start: detail_start,
            end: detail_end,
        }
    } else if param(params, "detail") == Some("trailing24h") {
        DetailRequest::Trailing(TRAILING_DETAIL_HOURS)
    } else {
        DetailRequest::Whole
    };

    Ok(ChartRequest {
        mode: RangeMode::parse(param(params, "range")),
        custom,
        detail,
    })
}

async fn respond<T: Serialize>(status: StatusCode, data: &T, compress: bool) -> Response {
    match json_response(status, data, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

async fn error_response(status: StatusCode, message: &str, compress: bool) -> Response {
    respond(status, &json!({ "error": message }), compress).await
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List stations, forwarding query parameters as upstream filters
pub async fn list_stations(
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let params: Vec<(String, String)> = params.into_iter().collect();

    match state.station_service.list_stations(&params).await {
        Ok(stations) => respond(StatusCode::OK, &Items { items: stations }, compress).await,
        Err(e) => {
            tracing::error!("Error fetching stations: {}", e);
            error_response(StatusCode::BAD_GATEWAY, "Failed to fetch stations", compress).await
        }
    }
}

/// A single station by reference
pub async fn get_station(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);

    match state.station_service.get_station(&id).await {
        Ok(Some(station)) => respond(StatusCode::OK, &station, compress).await,
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Station not found", compress).await,
        Err(e) => {
            tracing::error!("Error fetching station {}: {}", id, e);
            error_response(StatusCode::BAD_GATEWAY, "Failed to fetch station", compress).await
        }
    }
}

/// Raw readings for a station, oldest first
pub async fn station_readings(
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let request = match readings_request(params, state.chart_service.zone()) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string(), compress).await,
    };

    match state
        .station_service
        .station_readings(&id, &request, Utc::now())
        .await
    {
        Ok(readings) => respond(StatusCode::OK, &Items { items: readings }, compress).await,
        Err(e) => {
            tracing::error!("Error fetching readings for {}: {}", id, e);
            error_response(StatusCode::BAD_GATEWAY, "Failed to fetch readings", compress).await
        }
    }
}

/// Chart view for a station and range selection
pub async fn station_chart(
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let request = match chart_request(&params, state.chart_service.zone()) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string(), compress).await,
    };

    match state
        .chart_service
        .build_chart(&id, &request, Utc::now())
        .await
    {
        Ok(view) => respond(StatusCode::OK, &view, compress).await,
        Err(e @ ChartError::InvalidRange(_)) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string(), compress).await
        }
        Err(e @ ChartError::Fetch { .. }) => {
            error_response(StatusCode::BAD_GATEWAY, &e.to_string(), compress).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::chart_service::ChartService;
    use crate::application::fake_repository::FakeRepository;
    use crate::application::station_service::StationService;
    use crate::domain::chart::ChartStyle;
    use crate::domain::reading::{Reading, Station};
    use crate::infrastructure::config::DisplayZone;
    use crate::presentation::router;
    use chrono::Duration;
    use serde_json::Value;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_chart_request_from_query() {
        let params = query(&[
            ("range", "custom"),
            ("start", "2024-03-01"),
            ("end", "2024-03-05T00:00:00Z"),
        ]);
        let request = chart_request(&params, DisplayZone::Utc).unwrap();
        assert_eq!(request.mode, RangeMode::Custom);
        assert_eq!(
            request.custom,
            Some(CustomRange {
                start: at("2024-03-01T00:00:00Z"),
                end: at("2024-03-05T00:00:00Z"),
            })
        );
        assert_eq!(request.detail, DetailRequest::Whole);

        let params = query(&[("range", "week"), ("detail", "trailing24h")]);
        let request = chart_request(&params, DisplayZone::Utc).unwrap();
        assert_eq!(request.detail, DetailRequest::Trailing(24));

        let params = query(&[
            ("detailEnd", "2024-03-05T00:00:00Z"),
            ("detailStart", ""),
            ("detail", "trailing24h"),
        ]);
        let request = chart_request(&params, DisplayZone::Utc).unwrap();
        assert_eq!(request.mode, RangeMode::Last24Hours);
        assert!(matches!(request.detail, DetailRequest::Bounds { start: None, end: Some(_) }));

        let params = query(&[("range", "custom"), ("start", "last tuesday")]);
        assert_eq!(
            chart_request(&params, DisplayZone::Utc),
            Err(QueryError::InvalidTimestamp {
                name: "start".to_string(),
                value: "last tuesday".to_string(),
            })
        );
    }

    #[test]
    fn test_readings_request_from_query() {
        let params = query(&[
            ("since", "2024-03-01T10:00:00"),
            ("_limit", "50"),
            ("parameter", "level"),
            ("today", ""),
        ]);
        let request = readings_request(params, DisplayZone::Utc).unwrap();
        assert_eq!(request.since, Some(at("2024-03-01T10:00:00Z")));
        assert_eq!(request.limit, Some(50));
        assert_eq!(
            request.params,
            vec![
                ("parameter".to_string(), "level".to_string()),
                ("today".to_string(), String::new()),
            ]
        );

        let params = query(&[("_limit", "many")]);
        assert_eq!(
            readings_request(params, DisplayZone::Utc).unwrap_err(),
            QueryError::InvalidLimit("many".to_string())
        );
    }

    async fn serve(repository: FakeRepository) -> String {
        let repository = Arc::new(repository);
        let state = Arc::new(AppState {
            station_service: StationService::new(repository.clone()),
            chart_service: ChartService::new(repository, ChartStyle::default(), DisplayZone::Utc),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn recent_readings(count: i32) -> Vec<Reading> {
        let now = Utc::now();
        (1..=count)
            .map(|i| Reading::new(now - Duration::minutes(15) * i, 0.5, None))
            .collect()
    }

    #[tokio::test]
    async fn test_chart_endpoint() {
        let base = serve(FakeRepository::with_readings(recent_readings(8))).await;

        let response = reqwest::get(format!("{}/api/stations/E2043/chart?range=48h", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["title"], "48 Hour Readings");
        assert_eq!(body["window"]["mode"], "48h");
        assert_eq!(body["detailSeries"].as_array().unwrap().len(), 2);
        assert_eq!(body["readingCount"], 8);
        assert!(body["overview"]["overlay"]["widthPercent"].is_number());
        assert!(body["highlightedPoint"]["x"].is_number());
    }

    #[tokio::test]
    async fn test_chart_endpoint_errors() {
        let base = serve(FakeRepository {
            fail_readings: true,
            ..Default::default()
        })
        .await;

        let response = reqwest::get(format!("{}/api/stations/E2043/chart?range=week", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("E2043"));

        let response = reqwest::get(format!(
            "{}/api/stations/E2043/chart?range=custom&start={}&end={}",
            base, "2024-03-05T00:00:00Z", "2024-03-01T00:00:00Z"
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("must be before"));
    }

    #[tokio::test]
    async fn test_malformed_timestamps_get_json_errors() {
        let base = serve(FakeRepository::default()).await;

        for url in [
            format!("{}/api/stations/E2043/chart?range=custom&start=soon&end=2024-03-05", base),
            format!("{}/api/stations/E2043/readings?since=2024-03-01T25:00:00", base),
            format!("{}/api/stations/E2043/readings?_limit=-1", base),
        ] {
            let response = reqwest::get(&url).await.unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{}", url);
            assert_eq!(response.headers()["content-type"], "application/json");
            let body: Value = response.json().await.unwrap();
            assert!(body["error"].as_str().unwrap().starts_with("invalid"), "{}", url);
        }
    }

    #[tokio::test]
    async fn test_offset_less_timestamps_are_accepted() {
        let base = serve(FakeRepository::with_readings(recent_readings(3))).await;

        let response = reqwest::get(format!(
            "{}/api/stations/E2043/chart?range=custom&start=2024-03-01&end=2024-03-05",
            base
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["window"]["mode"], "custom");
        assert_eq!(body["window"]["since"], "2024-03-01T00:00:00Z");

        let since = (Utc::now() - Duration::hours(1)).format("%Y-%m-%dT%H:%M:%S%.f");
        let response = reqwest::get(format!(
            "{}/api/stations/E2043/readings?since={}&parameter=level",
            base, since
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["items"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_station_endpoints() {
        let base = serve(FakeRepository {
            stations: vec![Station {
                station_reference: "E2043".to_string(),
                label: Some("Surbiton".to_string()),
                river_name: Some("River Thames".to_string()),
                lat: Some(51.39),
                long: Some(-0.31),
                parameter: Some("level".to_string()),
            }],
            readings: recent_readings(3),
            ..Default::default()
        })
        .await;

        let body: Value = reqwest::get(format!("{}/api/stations?riverName=River%20Thames", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["items"][0]["stationReference"], "E2043");
        assert_eq!(body["items"][0]["riverName"], "River Thames");

        let missing = reqwest::get(format!("{}/api/stations/nope", base)).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "Station not found");

        let body: Value = reqwest::get(format!("{}/api/stations/E2043/readings", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0]["dateTime"].as_str().unwrap() < items[2]["dateTime"].as_str().unwrap());
    }
}
