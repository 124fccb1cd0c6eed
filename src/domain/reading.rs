// Reading and station domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A single water-level (or flow) reading for a station.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub date_time: DateTime<Utc>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<MeasureRef>,
}

impl Reading {
    pub fn new(date_time: DateTime<Utc>, value: f64, measure: Option<MeasureRef>) -> Self {
        Self {
            date_time,
            value,
            measure,
        }
    }

    pub fn time_ms(&self) -> i64 {
        self.date_time.timestamp_millis()
    }
}

/// What a reading measures. Upstream sends either a bare measure URL or an
/// object carrying some of the unit/parameter fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasureRef {
    Structured(StructuredMeasure),
    RawIdentifier(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredMeasure {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl MeasureRef {
    /// Build from the raw JSON `measure` field. Non-string fields inside an
    /// object are ignored rather than rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(MeasureRef::RawIdentifier(s.clone())),
            Value::Object(map) => {
                let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                Some(MeasureRef::Structured(StructuredMeasure {
                    id: text("@id").or_else(|| text("id")),
                    unit_name: text("unitName"),
                    parameter_name: text("parameterName"),
                    parameter: text("parameter"),
                }))
            }
            _ => None,
        }
    }

    /// The identifier string used for regex fallbacks.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            MeasureRef::Structured(s) => s.id.as_deref(),
            MeasureRef::RawIdentifier(id) => Some(id.as_str()),
        }
    }
}

/// A monitoring station as listed by the upstream station query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_reference: String,
    pub label: Option<String>,
    pub river_name: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub parameter: Option<String>,
}

impl Station {
    /// Parse one upstream station record. Some stations report several
    /// labels or coordinates as arrays; the first entry is used.
    pub fn from_value(value: &Value) -> Option<Self> {
        let station_reference = first_str(value.get("stationReference")?)?;
        Some(Self {
            station_reference,
            label: value.get("label").and_then(first_str),
            river_name: value.get("riverName").and_then(first_str),
            lat: value.get("lat").and_then(first_f64),
            long: value.get("long").and_then(first_f64),
            parameter: value.get("parameter").and_then(first_str),
        })
    }
}

fn first_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_str),
        _ => None,
    }
}

fn first_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.iter().find_map(first_f64),
        _ => None,
    }
}
