// Unit and parameter labels derived from a reading's measure
use super::reading::{MeasureRef, Reading};
use serde::Serialize;
use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_UNIT_NAME: &str = "Value";
pub const DEFAULT_PARAMETER_NAME: &str = "Reading";

static PARAMETER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/measures/\w+-([A-Za-z]+)").expect("valid parameter pattern"));

static UNIT_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-([A-Za-z0-9_]+(?:/[A-Za-z]+)?)$").expect("valid unit code pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedUnits {
    pub unit_name: String,
    pub parameter_name: String,
}

impl Default for ResolvedUnits {
    fn default() -> Self {
        Self {
            unit_name: DEFAULT_UNIT_NAME.to_string(),
            parameter_name: DEFAULT_PARAMETER_NAME.to_string(),
        }
    }
}

impl ResolvedUnits {
    /// Resolve labels for a whole series from its first reading.
    pub fn for_series(readings: &[Reading]) -> Self {
        readings
            .first()
            .map(|r| resolve_units(r.measure.as_ref()))
            .unwrap_or_default()
    }

    pub fn abbreviation(&self) -> String {
        abbreviate_unit(&self.unit_name)
    }

    /// Compact label for a y axis, e.g. "Level (mASD)".
    pub fn axis_label(&self) -> String {
        format!("{} ({})", self.parameter_name, self.abbreviation())
    }
}

/// Resolve unit and parameter names, falling back to the measure identifier
/// and finally to the defaults. Never fails.
pub fn resolve_units(measure: Option<&MeasureRef>) -> ResolvedUnits {
    let mut units = ResolvedUnits::default();

    if let Some(MeasureRef::Structured(s)) = measure {
        if let Some(unit) = non_empty(s.unit_name.as_deref()) {
            units.unit_name = unit.to_string();
        }
        if let Some(param) =
            non_empty(s.parameter_name.as_deref()).or(non_empty(s.parameter.as_deref()))
        {
            units.parameter_name = param.to_string();
        }
    }

    let identifier = measure.and_then(MeasureRef::identifier).unwrap_or("");

    if units.parameter_name == DEFAULT_PARAMETER_NAME {
        if let Some(caps) = PARAMETER_PATTERN.captures(identifier) {
            let parameter = capitalize(&caps[1]);
            if parameter == "Flow" {
                units.parameter_name = "Flow rate".to_string();
                if units.unit_name == DEFAULT_UNIT_NAME {
                    units.unit_name = "m³/s".to_string();
                }
            } else {
                units.parameter_name = parameter;
            }
        }
    }

    if units.unit_name == DEFAULT_UNIT_NAME {
        if let Some(caps) = UNIT_CODE_PATTERN.captures(identifier) {
            units.unit_name = unit_label(&caps[1]);
        }
    }

    units
}

/// Map a unit code from a measure identifier to a readable label. Unknown
/// codes are returned as-is.
pub fn unit_label(code: &str) -> String {
    match code {
        "m" => "meters".to_string(),
        "mASD" => "meters Above Station Datum (mASD)".to_string(),
        "mAOD" => "meters Above Ordnance Datum (mAOD)".to_string(),
        "m3/s" | "m3_s" => "cubic meters per second".to_string(),
        other => other.to_string(),
    }
}

/// Short axis code for a resolved unit name.
pub fn abbreviate_unit(unit_name: &str) -> String {
    if unit_name.contains("mASD") {
        "mASD".to_string()
    } else if unit_name.contains("mAOD") {
        "mAOD".to_string()
    } else if unit_name.contains("cubic meters per second")
        || unit_name.contains("m³/s")
        || unit_name.contains("m3/s")
    {
        "m³/s".to_string()
    } else if unit_name.contains("meters") {
        "m".to_string()
    } else {
        unit_name.to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
