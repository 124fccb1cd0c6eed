// Chart service - One fetch-and-recompute cycle for a range selection
use crate::application::readings_repository::{ReadingQuery, ReadingsRepository};
use crate::domain::aggregation::apply_aggregation;
use crate::domain::chart::{ChartInput, ChartStyle, ChartView, build_chart_view};
use crate::domain::partition::partition;
use crate::domain::reading::Reading;
use crate::domain::units::ResolvedUnits;
use crate::domain::window::{
    CustomRange, DetailViewRange, RangeMode, TimeWindow, WindowError, resolve_window,
};
use crate::infrastructure::config::DisplayZone;
use chrono::{DateTime, Duration, DurationRound, Local, TimeZone, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailRequest {
    #[default]
    Whole,
    /// The trailing N hours of the window.
    Trailing(i64),
    Bounds {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl DetailRequest {
    pub fn resolve(self, window: &TimeWindow) -> DetailViewRange {
        match self {
            DetailRequest::Whole => DetailViewRange::whole(window),
            DetailRequest::Trailing(hours) => DetailViewRange::trailing(window, hours),
            DetailRequest::Bounds { start, end } => DetailViewRange::clamped(window, start, end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRequest {
    pub mode: RangeMode,
    pub custom: Option<CustomRange>,
    pub detail: DetailRequest,
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error(transparent)]
    InvalidRange(#[from] WindowError),
    #[error("failed to fetch readings for station {station}: {source}")]
    Fetch {
        station: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Clone)]
pub struct ChartService {
    repository: Arc<dyn ReadingsRepository>,
    style: ChartStyle,
    zone: DisplayZone,
}

impl ChartService {
    pub fn new(
        repository: Arc<dyn ReadingsRepository>,
        style: ChartStyle,
        zone: DisplayZone,
    ) -> Self {
        Self {
            repository,
            style,
            zone,
        }
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Run one cycle. `now` is captured once by the caller and used for the
    /// window, the split threshold and the highlight alike.
    pub async fn build_chart(
        &self,
        station_id: &str,
        request: &ChartRequest,
        now: DateTime<Utc>,
    ) -> Result<ChartView, ChartError> {
        let window = match self.zone {
            DisplayZone::Local => resolve_window(request.mode, now, request.custom, &Local)?,
            DisplayZone::Utc => resolve_window(request.mode, now, request.custom, &Utc)?,
        };

        tracing::debug!(
            "Resolved window for {}: {} .. {} ({:?}, limit {})",
            station_id,
            window.since,
            window.until,
            window.aggregation,
            window.fetch_limit()
        );

        // Whole minutes keep the upstream URL, and so its cache entry, stable
        // across requests; the window filter below trims the extra readings.
        let since = window
            .since
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(window.since);
        let query = ReadingQuery::since(since, window.fetch_limit());
        let (station, readings) = futures::join!(
            self.repository.get_station(station_id),
            self.repository.fetch_readings(station_id, &query)
        );

        let readings = readings.map_err(|source| {
            tracing::error!("Error fetching readings for {}: {}", station_id, source);
            ChartError::Fetch {
                station: station_id.to_string(),
                source,
            }
        })?;

        let station_label = match station {
            Ok(station) => station.and_then(|s| s.label),
            Err(e) => {
                tracing::warn!("Station lookup failed for {}: {}", station_id, e);
                None
            }
        };

        let view = match self.zone {
            DisplayZone::Local => compose_chart(
                &window,
                readings,
                request.detail,
                station_label,
                now,
                &self.style,
                &Local,
            ),
            DisplayZone::Utc => compose_chart(
                &window,
                readings,
                request.detail,
                station_label,
                now,
                &self.style,
                &Utc,
            ),
        };

        Ok(view)
    }
}

/// Sort, label, aggregate, split and assemble fetched readings into a view.
pub fn compose_chart<Tz>(
    window: &TimeWindow,
    mut readings: Vec<Reading>,
    detail: DetailRequest,
    station_label: Option<String>,
    now: DateTime<Utc>,
    style: &ChartStyle,
    tz: &Tz,
) -> ChartView
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let fetched = readings.len();
    readings.retain(|r| window.contains(r.date_time));
    readings.sort_by_key(|r| r.date_time);

    let units = ResolvedUnits::for_series(&readings);
    let readings = apply_aggregation(readings, window.aggregation, tz);

    tracing::debug!(
        "{} readings fetched, {} in window after {:?} aggregation",
        fetched,
        readings.len(),
        window.aggregation
    );

    let split = partition(&readings, window.mode, &units.parameter_name, now, tz);
    let detail = detail.resolve(window);

    build_chart_view(
        ChartInput {
            window,
            units: &units,
            readings: &readings,
            split: &split,
            detail,
            station_label,
        },
        style,
        tz,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fake_repository::FakeRepository;
    use crate::domain::partition::Segment;
    use crate::domain::reading::{MeasureRef, Station};
    use crate::domain::window::{Aggregation, DEFAULT_FETCH_LIMIT, MONTH_FETCH_LIMIT};
    const LEVEL_MEASURE: &str = concat!(
        "http://environment.data.gov.uk/flood-monitoring",
        "/id/measures/1234-level-stage-i-15_min-mASD"
    );

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn readings_back_from(now: DateTime<Utc>, step: Duration, count: i32) -> Vec<Reading> {
        // Newest first, as an unsorted upstream might return them.
        (1..=count)
            .map(|i| {
                Reading::new(
                    now - step * i,
                    1.0 + f64::from(i) / 100.0,
                    Some(MeasureRef::RawIdentifier(LEVEL_MEASURE.to_string())),
                )
            })
            .collect()
    }

    fn service(repository: Arc<FakeRepository>) -> ChartService {
        ChartService::new(repository, ChartStyle::default(), DisplayZone::Utc)
    }

    fn request(mode: RangeMode) -> ChartRequest {
        ChartRequest {
            mode,
            custom: None,
            detail: DetailRequest::Whole,
        }
    }

    #[tokio::test]
    async fn test_24h_chart() {
        let now = at("2024-03-02T10:00:00Z");
        let repository = Arc::new(FakeRepository {
            readings: readings_back_from(now, Duration::minutes(15), 95),
            stations: vec![Station {
                station_reference: "E2043".to_string(),
                label: Some("Surbiton".to_string()),
                river_name: None,
                lat: None,
                long: None,
                parameter: None,
            }],
            ..Default::default()
        });

        let view = service(repository.clone())
            .build_chart("E2043", &request(RangeMode::Last24Hours), now)
            .await
            .unwrap();

        let query = repository.last_query().unwrap();
        assert_eq!(query.since, Some(at("2024-03-01T10:00:00Z")));
        assert_eq!(query.limit, Some(DEFAULT_FETCH_LIMIT));

        assert_eq!(view.station_label.as_deref(), Some("Surbiton"));
        assert_eq!(view.units.parameter_name, "Level");
        assert_eq!(view.units.axis_label, "Level (mASD)");
        assert_eq!(view.detail_series[0].label, "Yesterday's Level");
        assert_eq!(view.reading_count, 95);
        assert!(view.overview.is_none());

        let highlighted = view.highlighted_point.unwrap();
        assert_eq!(highlighted.series, 1);
        assert_eq!(highlighted.x, at("2024-03-02T09:45:00Z").timestamp_millis());
        let first = &view.detail_series[0].points[0];
        assert!(first.x < view.detail_series[0].points[1].x);
    }

    #[tokio::test]
    async fn test_month_chart_is_daily_and_has_overview() {
        let now = at("2024-03-20T12:00:00Z");
        let repository = Arc::new(FakeRepository::with_readings(readings_back_from(
            now,
            Duration::hours(1),
            24 * 40,
        )));

        let view = service(repository.clone())
            .build_chart("E2043", &request(RangeMode::Month), now)
            .await
            .unwrap();

        assert_eq!(repository.last_query().unwrap().limit, Some(MONTH_FETCH_LIMIT));
        assert_eq!(view.window.aggregation, Aggregation::Daily);
        // 2024-02-20T12:00 .. 2024-03-20T11:00 spans 30 calendar days.
        assert_eq!(view.reading_count, 30);
        assert_eq!(view.detail_series[1].label, "Current Week Level");
        assert_eq!(view.window.threshold, at("2024-03-18T00:00:00Z"));

        let overview = view.overview.unwrap();
        assert_eq!(overview.series.points.len(), 30);
        assert!((overview.overlay.width_percent - 100.0).abs() < 1e-9);
        assert!(view.station_label.is_none());
    }

    #[tokio::test]
    async fn test_custom_range_filters_to_window() {
        let now = at("2024-03-20T12:00:00Z");
        let repository = Arc::new(FakeRepository::with_readings(readings_back_from(
            now,
            Duration::minutes(30),
            48 * 3,
        )));
        let request = ChartRequest {
            mode: RangeMode::Custom,
            custom: Some(CustomRange {
                start: at("2024-03-18T12:00:00Z"),
                end: at("2024-03-19T12:00:00Z"),
            }),
            detail: DetailRequest::Trailing(6),
        };

        let view = service(repository)
            .build_chart("E2043", &request, now)
            .await
            .unwrap();

        assert_eq!(view.window.aggregation, Aggregation::None);
        assert_eq!(view.reading_count, 48);
        assert_eq!(view.detail_range.start, at("2024-03-19T06:00:00Z"));
        assert!(view.overview.is_some());
        // Latest reading at 11:30 on the 19th is inside the detail range.
        let highlighted = view.highlighted_point.unwrap();
        assert_eq!(highlighted.x, at("2024-03-19T11:30:00Z").timestamp_millis());
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let repository = Arc::new(FakeRepository::default());
        let view = service(repository)
            .build_chart("E2043", &request(RangeMode::Week), at("2024-03-02T10:00:00Z"))
            .await
            .unwrap();

        assert!(view.detail_series[0].points.is_empty());
        assert!(view.overview.is_none());
        assert!(view.highlighted_point.is_none());
        assert_eq!(view.units.unit_name, "Value");
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_once() {
        let repository = Arc::new(FakeRepository {
            fail_readings: true,
            ..Default::default()
        });

        let err = service(repository.clone())
            .build_chart("E2043", &request(RangeMode::Week), at("2024-03-02T10:00:00Z"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChartError::Fetch { .. }));
        assert_eq!(repository.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_station_failure_is_not_fatal() {
        let now = at("2024-03-02T10:00:00Z");
        let repository = Arc::new(FakeRepository {
            readings: readings_back_from(now, Duration::minutes(15), 4),
            fail_stations: true,
            ..Default::default()
        });

        let view = service(repository)
            .build_chart("E2043", &request(RangeMode::Last24Hours), now)
            .await
            .unwrap();
        assert!(view.station_label.is_none());
        assert_eq!(view.reading_count, 4);
    }

    #[tokio::test]
    async fn test_invalid_custom_range() {
        let now = at("2024-03-02T10:00:00Z");
        let repository = Arc::new(FakeRepository::default());
        let request = ChartRequest {
            mode: RangeMode::Custom,
            custom: Some(CustomRange {
                start: now,
                end: now - Duration::hours(1),
            }),
            detail: DetailRequest::Whole,
        };

        let err = service(repository.clone())
            .build_chart("E2043", &request, now)
            .await
            .unwrap_err();

        assert!(matches!(err, ChartError::InvalidRange(_)));
        assert!(repository.last_query().is_none());
    }

    #[tokio::test]
    async fn test_since_is_requested_in_whole_minutes() {
        let repository = Arc::new(FakeRepository::default());
        let service = service(repository.clone());

        for now in [at("2024-03-02T10:00:12Z"), at("2024-03-02T10:00:47.5Z")] {
            service
                .build_chart("E2043", &request(RangeMode::Last24Hours), now)
                .await
                .unwrap();
        }

        let queries = repository.queries.lock().unwrap();
        assert_eq!(queries[0].since, Some(at("2024-03-01T10:00:00Z")));
        assert_eq!(queries[0], queries[1]);
    }

    #[tokio::test]
    async fn test_stale_series_highlights_last_older_point() {
        // Nothing in the last 24 hours: the latest reading sits in "yesterday".
        let now = at("2024-03-02T10:00:00Z");
        let readings = (27..=30)
            .map(|h| Reading::new(now - Duration::hours(h), 0.5, None))
            .collect();
        let repository = Arc::new(FakeRepository::with_readings(readings));

        let view = service(repository)
            .build_chart("E2043", &request(RangeMode::Last48Hours), now)
            .await
            .unwrap();

        let highlighted = view.highlighted_point.unwrap();
        assert_eq!(highlighted.series, 0);
        assert_eq!(highlighted.segment, Segment::Older);
        assert_eq!(highlighted.index, 3);
        assert_eq!(highlighted.x, at("2024-03-01T07:00:00Z").timestamp_millis());

        let style = ChartStyle::default();
        let older = &view.detail_series[0].points;
        assert_eq!(older.len(), 4);
        assert_eq!(older[3].color, style.highlight_color);
        assert_eq!(older[3].radius, style.highlight_radius);
        assert!(older[..3].iter().all(|p| p.color == style.older_color));
        assert!(view.detail_series[1].points.is_empty());
    }
}
