// Chart view model handed to the rendering client
use super::partition::{Segment, SeriesSplit};
use super::reading::Reading;
use super::units::ResolvedUnits;
use super::window::{Aggregation, DetailViewRange, RangeMode, TimeWindow, format_local};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Colors and point sizes for the rendered series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub older_color: String,
    pub recent_color: String,
    pub highlight_color: String,
    pub overview_color: String,
    pub point_radius: f64,
    pub highlight_radius: f64,
    pub overlay_min_width_percent: f64,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            older_color: "rgba(54, 162, 235, 1)".to_string(),
            recent_color: "rgba(75, 192, 192, 1)".to_string(),
            highlight_color: "rgba(255, 99, 132, 1)".to_string(),
            overview_color: "rgba(153, 153, 153, 1)".to_string(),
            point_radius: 2.0,
            highlight_radius: 6.0,
            overlay_min_width_percent: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: i64,
    pub y: f64,
    pub color: String,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: String,
    pub color: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewOverlay {
    pub left_percent: f64,
    pub width_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub series: ChartSeries,
    pub overlay: OverviewOverlay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub timestamp: DateTime<Utc>,
    pub time: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightedPoint {
    /// Index into `detailSeries`.
    pub series: usize,
    pub segment: Segment,
    pub index: usize,
    pub x: i64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub mode: RangeMode,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub aggregation: Aggregation,
    pub threshold: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitsSummary {
    pub unit_name: String,
    pub parameter_name: String,
    pub unit_abbreviation: String,
    pub axis_label: String,
}

impl From<&ResolvedUnits> for UnitsSummary {
    fn from(units: &ResolvedUnits) -> Self {
        Self {
            unit_name: units.unit_name.clone(),
            parameter_name: units.parameter_name.clone(),
            unit_abbreviation: units.abbreviation(),
            axis_label: units.axis_label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_label: Option<String>,
    pub window: WindowSummary,
    pub units: UnitsSummary,
    pub reading_count: usize,
    pub detail_range: DetailViewRange,
    /// Older segment first, then recent. Both are always present.
    pub detail_series: Vec<ChartSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<Overview>,
    pub table_rows: Vec<TableRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_point: Option<HighlightedPoint>,
}

/// Everything one recomputation produced before the view is assembled.
pub struct ChartInput<'a> {
    pub window: &'a TimeWindow,
    pub units: &'a ResolvedUnits,
    /// The whole window's series, aggregated if the window asks for it.
    pub readings: &'a [Reading],
    pub split: &'a SeriesSplit,
    pub detail: DetailViewRange,
    pub station_label: Option<String>,
}

pub fn build_chart_view<Tz>(input: ChartInput<'_>, style: &ChartStyle, tz: &Tz) -> ChartView
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let ChartInput {
        window,
        units,
        readings,
        split,
        detail,
        station_label,
    } = input;

    let in_detail = |segment: &[Reading]| -> Vec<Reading> {
        segment
            .iter()
            .filter(|r| detail.contains(r.date_time))
            .cloned()
            .collect()
    };
    let older = in_detail(&split.older);
    let recent = in_detail(&split.recent);

    let highlight = split.highlight(&detail);
    let highlight_in = |segment: Segment| {
        highlight
            .filter(|h| h.segment == segment)
            .map(|h| h.index)
    };

    let detail_series = vec![
        build_series(
            split.older_label.clone(),
            &style.older_color,
            &older,
            highlight_in(Segment::Older),
            style,
        ),
        build_series(
            split.recent_label.clone(),
            &style.recent_color,
            &recent,
            highlight_in(Segment::Recent),
            style,
        ),
    ];

    let highlighted_point = highlight.and_then(|h| {
        let latest = split.latest()?;
        Some(HighlightedPoint {
            series: match h.segment {
                Segment::Older => 0,
                Segment::Recent => 1,
            },
            segment: h.segment,
            index: h.index,
            x: latest.time_ms(),
            y: latest.value,
        })
    });

    let overview = if window.mode != RangeMode::Last24Hours && !readings.is_empty() {
        Some(Overview {
            series: build_series(
                format!("{} (full range)", units.parameter_name),
                &style.overview_color,
                readings,
                None,
                style,
            ),
            overlay: overview_overlay(window, &detail, style.overlay_min_width_percent),
        })
    } else {
        None
    };

    let detail_readings: Vec<Reading> = readings
        .iter()
        .filter(|r| detail.contains(r.date_time))
        .cloned()
        .collect();

    ChartView {
        title: window.title.clone(),
        station_label,
        window: WindowSummary {
            mode: window.mode,
            since: window.since,
            until: window.until,
            aggregation: window.aggregation,
            threshold: split.threshold,
        },
        units: UnitsSummary::from(units),
        reading_count: readings.len(),
        detail_range: detail,
        detail_series,
        overview,
        table_rows: table_rows(&detail_readings, tz),
        highlighted_point,
    }
}

/// Build a series with final point styles. The point at `highlight`, if any,
/// gets the highlight color and radius.
pub fn build_series(
    label: String,
    color: &str,
    readings: &[Reading],
    highlight: Option<usize>,
    style: &ChartStyle,
) -> ChartSeries {
    let points = readings
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let highlighted = highlight == Some(i);
            ChartPoint {
                x: r.time_ms(),
                y: r.value,
                color: if highlighted {
                    style.highlight_color.clone()
                } else {
                    color.to_string()
                },
                radius: if highlighted {
                    style.highlight_radius
                } else {
                    style.point_radius
                },
            }
        })
        .collect();

    ChartSeries {
        label,
        color: color.to_string(),
        points,
    }
}

/// Shaded overlay on the overview marking the detail range, as percentages of
/// the window. The width never drops below `min_width` so a narrow detail
/// range stays visible.
pub fn overview_overlay(
    window: &TimeWindow,
    detail: &DetailViewRange,
    min_width: f64,
) -> OverviewOverlay {
    let total_ms = window.span().num_milliseconds() as f64;
    if total_ms <= 0.0 {
        return OverviewOverlay {
            left_percent: 0.0,
            width_percent: 100.0,
        };
    }

    let percent = |ms: i64| (ms as f64 * 100.0 / total_ms).clamp(0.0, 100.0);
    let width = percent(detail.span().num_milliseconds()).max(min_width);
    let left = percent((detail.start - window.since).num_milliseconds()).min(100.0 - width);

    OverviewOverlay {
        left_percent: left.max(0.0),
        width_percent: width,
    }
}

/// Rows for the readings table: the first and last reading, plus every
/// reading on the hour or half hour.
pub fn table_rows<Tz>(readings: &[Reading], tz: &Tz) -> Vec<TableRow>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let last = readings.len().saturating_sub(1);
    readings
        .iter()
        .enumerate()
        .filter(|(i, r)| *i == 0 || *i == last || r.date_time.with_timezone(tz).minute() % 30 == 0)
        .map(|(_, r)| TableRow {
            timestamp: r.date_time,
            time: format_local(r.date_time, tz),
            value: r.value,
        })
        .collect()
}
