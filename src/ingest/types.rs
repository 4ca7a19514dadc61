// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

use crate::geo::GeoPoint;

/// USGS-style alert severity. Ordering is significance: `Red > Orange >
/// Yellow > Green`; an absent alert ranks below all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

/// Event location as reported by the feed: `(longitude, latitude, depth km)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
    pub depth_km: Option<f64>,
}

/// One seismic occurrence. Identity is `id` alone; two records with the same
/// id are the same event regardless of field differences.
///
/// Numeric fields are `Option`: the feeds routinely ship events with missing
/// or junk magnitudes/times, and those events must flow through untouched,
/// silently skipped only by the specific computation that needs the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuakeEvent {
    pub id: String,
    /// Epoch milliseconds; `None` means unsortable (excluded from time windows).
    #[serde(default, deserialize_with = "lenient_i64")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub alert: Option<AlertLevel>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub tsunami: bool,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub depth_km: Option<f64>,
    #[serde(default)]
    pub coords: Option<Coordinates>,
}

impl QuakeEvent {
    /// Magnitude usable for comparisons: present and not NaN.
    pub fn valid_magnitude(&self) -> Option<f64> {
        self.magnitude.filter(|m| !m.is_nan())
    }

    /// Occurrence time usable for window math.
    pub fn valid_time(&self) -> Option<i64> {
        self.time
    }

    pub fn geo_point(&self) -> Option<GeoPoint> {
        self.coords.map(|c| GeoPoint::new(c.lon, c.lat))
    }
}

/// Accept numbers, numeric strings, or null/garbage without failing the
/// surrounding payload.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// The raw feed encodes tsunami as 0/1; the store as a bool.
fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|x| x != 0),
        _ => false,
    })
}

/// One of the fixed rolling spans the dashboard maintains independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Short, Horizon::Medium, Horizon::Long];

    /// Selector sent to the raw feed (day/week/month feed variants).
    pub fn feed_selector(self) -> &'static str {
        match self {
            Horizon::Short => "all_day",
            Horizon::Medium => "all_week",
            Horizon::Long => "all_month",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Horizon::Short => "short",
            Horizon::Medium => "medium",
            Horizon::Long => "long",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Some(Horizon::Short),
            "medium" => Some(Horizon::Medium),
            "long" => Some(Horizon::Long),
            _ => None,
        }
    }
}

/// Which backing source actually produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    Primary,
    Secondary,
}

/// A backing source queried by the fallback fetcher. Implementations return
/// the raw JSON payload; validation and parsing stay with the fetcher so a
/// malformed body is a fallback trigger, not a provider error.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, horizon: Horizon) -> Result<serde_json::Value>;
    fn name(&self) -> &'static str;
}
