// Bucket aggregation of dense reading series
use super::reading::Reading;
use super::window::Aggregation;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Aggregation {
    pub fn granularity(self) -> Option<Granularity> {
        match self {
            Aggregation::None => None,
            Aggregation::Hourly => Some(Granularity::Hourly),
            Aggregation::Daily => Some(Granularity::Daily),
        }
    }
}

/// One bucket reduced to a single point.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPoint {
    pub date_time: DateTime<Utc>,
    pub value: f64,
    pub source_readings: Vec<Reading>,
}

impl AggregatedPoint {
    /// The point as a plain reading, carrying the measure of its bucket.
    pub fn to_reading(&self) -> Reading {
        let measure = self
            .source_readings
            .first()
            .and_then(|r| r.measure.clone());
        Reading::new(self.date_time, self.value, measure)
    }
}

/// Local-time truncation key: the calendar date plus the hour for hourly
/// buckets.
type BucketKey = (NaiveDate, Option<u32>);

fn bucket_key<Tz: TimeZone>(
    instant: DateTime<Utc>,
    granularity: Granularity,
    tz: &Tz,
) -> BucketKey {
    let local = instant.with_timezone(tz);
    match granularity {
        Granularity::Hourly => (local.date_naive(), Some(local.hour())),
        Granularity::Daily => (local.date_naive(), None),
    }
}

/// Group readings into hour or day buckets and reduce each to its mean.
///
/// Each point is stamped with the time of the bucket's middle member so it
/// plots inside the bucket rather than on its edge.
pub fn aggregate<Tz: TimeZone>(
    readings: &[Reading],
    granularity: Granularity,
    tz: &Tz,
) -> Vec<AggregatedPoint> {
    let mut buckets: HashMap<BucketKey, Vec<Reading>> = HashMap::new();
    for reading in readings {
        buckets
            .entry(bucket_key(reading.date_time, granularity, tz))
            .or_default()
            .push(reading.clone());
    }

    let mut points: Vec<AggregatedPoint> = buckets
        .into_values()
        .map(|members| {
            let mid_idx = members.len() / 2;
            let avg_value = members.iter().map(|r| r.value).sum::<f64>() / members.len() as f64;
            AggregatedPoint {
                date_time: members[mid_idx].date_time,
                value: avg_value,
                source_readings: members,
            }
        })
        .collect();

    points.sort_by_key(|p| p.date_time);
    points
}

/// Apply the window's aggregation to a sorted series. `Aggregation::None`
/// returns the series untouched.
pub fn apply_aggregation<Tz: TimeZone>(
    readings: Vec<Reading>,
    aggregation: Aggregation,
    tz: &Tz,
) -> Vec<Reading> {
    match aggregation.granularity() {
        None => readings,
        Some(granularity) => aggregate(&readings, granularity, tz)
            .iter()
            .map(AggregatedPoint::to_reading)
            .collect(),
    }
}
