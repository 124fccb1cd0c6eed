use crate::domain::chart::ChartStyle;
use crate::domain::window::parse_timestamp;
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://environment.data.gov.uk/flood-monitoring";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl_secs: 300,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DisplaySettings {
    pub time_zone: DisplayZone,
}

/// Zone used for bucket keys, day/week boundaries and table times.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayZone {
    #[default]
    Local,
    Utc,
}

impl DisplayZone {
    /// Parse a query timestamp, reading offset-less values in this zone.
    pub fn parse_timestamp(self, value: &str) -> Option<DateTime<Utc>> {
        match self {
            DisplayZone::Local => parse_timestamp(value, &Local),
            DisplayZone::Utc => parse_timestamp(value, &Utc),
        }
    }
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/app").required(false))
        .add_source(
            config::Environment::with_prefix("RIVER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_chart_style() -> anyhow::Result<ChartStyle> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/chart").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}
