// Time window resolution for a range selection
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Upstream `_limit` for month windows, which hold many more points.
pub const MONTH_FETCH_LIMIT: usize = 5000;
pub const DEFAULT_FETCH_LIMIT: usize = 2000;

/// Display format for instants shown to users (titles, table rows).
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RangeMode {
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "48h")]
    Last48Hours,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "custom")]
    Custom,
}

impl RangeMode {
    /// Parse a selection; unknown or missing values select the 24 hour view.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("48h") => RangeMode::Last48Hours,
            Some("week") => RangeMode::Week,
            Some("month") => RangeMode::Month,
            Some("custom") => RangeMode::Custom,
            _ => RangeMode::Last24Hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    None,
    Hourly,
    Daily,
}

impl Aggregation {
    /// Granularity for a caller-chosen span.
    pub fn for_span(span: Duration) -> Self {
        if span > Duration::days(14) {
            Aggregation::Daily
        } else if span > Duration::days(3) {
            Aggregation::Hourly
        } else {
            Aggregation::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub mode: RangeMode,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub title: String,
    pub aggregation: Aggregation,
}

impl TimeWindow {
    pub fn span(&self) -> Duration {
        self.until - self.since
    }

    /// Half-open membership: `since <= instant < until`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.since <= instant && instant < self.until
    }

    /// Cap on the number of readings requested upstream. If the source
    /// truncates, the window is simply built from what came back.
    pub fn fetch_limit(&self) -> usize {
        match self.mode {
            RangeMode::Month => MONTH_FETCH_LIMIT,
            _ => DEFAULT_FETCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("custom range start {since} must be before end {until}")]
    EmptyRange {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

/// Resolve a selection into a concrete `[since, until)` window.
///
/// A custom selection without bounds is treated like an unknown mode and
/// falls back to the 24 hour window.
pub fn resolve_window<Tz>(
    mode: RangeMode,
    now: DateTime<Utc>,
    custom: Option<CustomRange>,
    tz: &Tz,
) -> Result<TimeWindow, WindowError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let window = match (mode, custom) {
        (RangeMode::Custom, Some(range)) => {
            if range.start >= range.end {
                return Err(WindowError::EmptyRange {
                    since: range.start,
                    until: range.end,
                });
            }
            TimeWindow {
                mode,
                since: range.start,
                until: range.end,
                title: format!(
                    "Custom Range ({}–{})",
                    format_local(range.start, tz),
                    format_local(range.end, tz)
                ),
                aggregation: Aggregation::for_span(range.end - range.start),
            }
        }
        (RangeMode::Last48Hours, _) => relative(
            mode,
            now,
            now - Duration::hours(48),
            "48 Hour Readings",
            Aggregation::None,
        ),
        (RangeMode::Week, _) => relative(
            mode,
            now,
            now - Duration::days(7),
            "Last 7 Days",
            Aggregation::Hourly,
        ),
        (RangeMode::Month, _) => {
            let since = now
                .with_timezone(tz)
                .checked_sub_months(Months::new(1))
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now - Duration::days(30));
            relative(mode, now, since, "Last Month", Aggregation::Daily)
        }
        _ => relative(
            RangeMode::Last24Hours,
            now,
            now - Duration::hours(24),
            "24 Hour Readings",
            Aggregation::None,
        ),
    };

    Ok(window)
}

fn relative(
    mode: RangeMode,
    now: DateTime<Utc>,
    since: DateTime<Utc>,
    title: &str,
    aggregation: Aggregation,
) -> TimeWindow {
    TimeWindow {
        mode,
        since,
        until: now,
        title: title.to_string(),
        aggregation,
    }
}

pub fn format_local<Tz>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    instant
        .with_timezone(tz)
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}

/// Local midnight at the start of the day containing `instant`.
pub fn start_of_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let date = instant.with_timezone(tz).date_naive();
    local_midnight(date, tz).unwrap_or(instant)
}

/// Local midnight on the Monday of the week containing `instant`.
pub fn start_of_week<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let date = instant.with_timezone(tz).date_naive();
    let offset = Days::new(u64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_days(offset)
        .and_then(|monday| local_midnight(monday, tz))
        .unwrap_or(instant)
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    // Zones that skip midnight for DST start the day an hour later.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|d| d.with_timezone(&Utc))
}

/// Parse a timestamp from a query string. RFC 3339 values carry their own
/// offset; offset-less date-times and bare dates are read in `tz`.
pub fn parse_timestamp<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok());
    match naive {
        Some(naive) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|d| d.with_timezone(&Utc)),
        None => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| local_midnight(date, tz)),
    }
}

/// The part of the window that is plotted and tabulated. Always lies inside
/// the window; membership is inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetailViewRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DetailViewRange {
    pub fn whole(window: &TimeWindow) -> Self {
        Self {
            start: window.since,
            end: window.until,
        }
    }

    /// The last `hours` of the window, or all of it if the window is shorter.
    pub fn trailing(window: &TimeWindow, hours: i64) -> Self {
        let start = (window.until - Duration::hours(hours)).max(window.since);
        Self {
            start,
            end: window.until,
        }
    }

    /// Caller-chosen bounds clamped into the window. Missing bounds default
    /// to the window edges; reversed bounds are swapped.
    pub fn clamped(
        window: &TimeWindow,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let clamp = |t: DateTime<Utc>| t.clamp(window.since, window.until);
        let start = clamp(start.unwrap_or(window.since));
        let end = clamp(end.unwrap_or(window.until));
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}
