// Older/recent split of a series and most-recent point lookup
use super::reading::Reading;
use super::window::{DetailViewRange, RangeMode, start_of_day, start_of_week};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Older,
    Recent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSplit {
    pub older_label: String,
    pub recent_label: String,
    pub older: Vec<Reading>,
    pub recent: Vec<Reading>,
    pub threshold: DateTime<Utc>,
}

/// Where the most recent point sits in the plotted detail series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub segment: Segment,
    pub index: usize,
}

/// Instant separating "older" from "recent" readings for a selection.
///
/// Week and month use calendar day/week boundaries, not the rolling window
/// edges.
pub fn split_threshold<Tz: TimeZone>(
    mode: RangeMode,
    now: DateTime<Utc>,
    tz: &Tz,
) -> DateTime<Utc> {
    match mode {
        RangeMode::Last48Hours => now - Duration::hours(24),
        RangeMode::Month => start_of_week(now, tz),
        RangeMode::Last24Hours | RangeMode::Week | RangeMode::Custom => start_of_day(now, tz),
    }
}

/// Legend labels for the older and recent segments.
pub fn segment_labels(mode: RangeMode, parameter_name: &str) -> (String, String) {
    match mode {
        RangeMode::Last24Hours | RangeMode::Last48Hours => (
            format!("Yesterday's {}", parameter_name),
            format!("Today's {}", parameter_name),
        ),
        RangeMode::Week => (
            format!("Last 6 Days {}", parameter_name),
            format!("Today's {}", parameter_name),
        ),
        RangeMode::Month => (
            format!("Last 3 Weeks {}", parameter_name),
            format!("Current Week {}", parameter_name),
        ),
        RangeMode::Custom => (
            format!("Earlier {}", parameter_name),
            format!("Today's {}", parameter_name),
        ),
    }
}

/// Split a sorted series at the selection's threshold. Readings exactly at
/// the threshold count as recent.
pub fn partition<Tz: TimeZone>(
    readings: &[Reading],
    mode: RangeMode,
    parameter_name: &str,
    now: DateTime<Utc>,
    tz: &Tz,
) -> SeriesSplit {
    let threshold = split_threshold(mode, now, tz);
    let (older, recent): (Vec<Reading>, Vec<Reading>) = readings
        .iter()
        .cloned()
        .partition(|r| r.date_time < threshold);
    let (older_label, recent_label) = segment_labels(mode, parameter_name);

    SeriesSplit {
        older_label,
        recent_label,
        older,
        recent,
        threshold,
    }
}

impl SeriesSplit {
    pub fn segment_of(&self, instant: DateTime<Utc>) -> Segment {
        if instant < self.threshold {
            Segment::Older
        } else {
            Segment::Recent
        }
    }

    pub fn segment(&self, segment: Segment) -> &[Reading] {
        match segment {
            Segment::Older => &self.older,
            Segment::Recent => &self.recent,
        }
    }

    /// Last element of the full sorted series.
    pub fn latest(&self) -> Option<&Reading> {
        self.recent.last().or_else(|| self.older.last())
    }

    /// Locate the most recent reading among the detail-range members of its
    /// segment. `None` when the series is empty or the reading lies outside
    /// the detail range.
    pub fn highlight(&self, detail: &DetailViewRange) -> Option<Highlight> {
        let latest = self.latest()?;
        let segment = self.segment_of(latest.date_time);
        let index = self
            .segment(segment)
            .iter()
            .filter(|r| detail.contains(r.date_time))
            .position(|r| r.date_time == latest.date_time)?;

        Some(Highlight { segment, index })
    }
}
