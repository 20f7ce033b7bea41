//! Threshold monitoring over raw telemetry
//!
//! Pure functions that derive power balance, thermal violations, power
//! deficits and donor headroom from a resource snapshot. Nothing here is
//! cached; every call recomputes from its inputs.

use crate::models::{value_of, ClusterMap, POWER_MARGIN, TEMP_LIMIT};

/// Cluster name a bare scalar temperature is attributed to
pub const SCALAR_READING_CLUSTER: &str = "GPU_A";

/// Temperature telemetry as delivered by a caller
///
/// `Scalar` is a compatibility shim for callers that hand over a single
/// reading instead of a per-cluster map; it is attributed to
/// [`SCALAR_READING_CLUSTER`]. `Unreadable` covers telemetry that is not
/// numeric at all and never produces a violation.
#[derive(Debug, Clone, PartialEq)]
pub enum TemperatureReading {
    PerCluster(ClusterMap),
    Scalar(f64),
    Unreadable,
}

impl From<&ClusterMap> for TemperatureReading {
    fn from(map: &ClusterMap) -> Self {
        TemperatureReading::PerCluster(map.clone())
    }
}

impl From<ClusterMap> for TemperatureReading {
    fn from(map: ClusterMap) -> Self {
        TemperatureReading::PerCluster(map)
    }
}

impl From<&serde_json::Value> for TemperatureReading {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(obj) => {
                let map = obj
                    .iter()
                    .filter_map(|(c, v)| v.as_f64().map(|t| (c.clone(), t)))
                    .collect();
                TemperatureReading::PerCluster(map)
            }
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(TemperatureReading::Scalar)
                .unwrap_or(TemperatureReading::Unreadable),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(TemperatureReading::Scalar)
                .unwrap_or(TemperatureReading::Unreadable),
            _ => TemperatureReading::Unreadable,
        }
    }
}

/// Net kW available per cluster: `grid + battery_out - draw`
///
/// Keys follow `draw`; clusters absent from `grid` or `battery_out` count
/// as zero.
pub fn power_balance(grid: &ClusterMap, draw: &ClusterMap, battery_out: &ClusterMap) -> ClusterMap {
    draw.iter()
        .map(|(c, d)| (c.clone(), value_of(grid, c) + value_of(battery_out, c) - d))
        .collect()
}

/// Clusters whose temperature exceeds [`TEMP_LIMIT`]
pub fn thermal_violations(reading: impl Into<TemperatureReading>) -> ClusterMap {
    match reading.into() {
        TemperatureReading::PerCluster(temps) => temps
            .into_iter()
            .filter(|(_, t)| *t > TEMP_LIMIT)
            .collect(),
        TemperatureReading::Scalar(t) if t > TEMP_LIMIT => {
            ClusterMap::from([(SCALAR_READING_CLUSTER.to_string(), t)])
        }
        TemperatureReading::Scalar(_) | TemperatureReading::Unreadable => ClusterMap::new(),
    }
}

/// Clusters whose balance is strictly below `-POWER_MARGIN`
pub fn power_deficits(balance: &ClusterMap) -> ClusterMap {
    deficits_below(balance, -POWER_MARGIN)
}

/// Clusters whose balance is strictly below `threshold`
pub fn deficits_below(balance: &ClusterMap, threshold: f64) -> ClusterMap {
    balance
        .iter()
        .filter(|(_, b)| **b < threshold)
        .map(|(c, b)| (c.clone(), *b))
        .collect()
}

/// Surplus grid capacity per cluster: `max(0, balance)`
pub fn donor_headroom(balance: &ClusterMap) -> ClusterMap {
    balance
        .iter()
        .map(|(c, b)| (c.clone(), b.max(0.0)))
        .collect()
}
