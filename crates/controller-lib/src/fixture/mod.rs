//! Scenario fixtures
//!
//! A fixture is fixed cluster metadata (grid, cooling and battery
//! capacities) plus a scenario snapshot (draw, temperature, utilization,
//! online cooling, battery reserve). Both are JSON documents keyed by
//! cluster name. Loading normalizes every metric onto the run's cluster
//! list so the resulting [`ResourceState`] has uniform keys.

mod cache;

pub use cache::{CacheStats, FixtureCache, DEFAULT_CACHE_CAPACITY};

use crate::models::{ClusterMap, ResourceState, DEFAULT_CLUSTERS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata file name inside a data directory
pub const METADATA_FILE: &str = "clusters.json";

/// Cluster that scenario-level failure injection targets
pub const FAILURE_INJECTION_CLUSTER: &str = "GPU_A";

/// A metric as it appears in a fixture document
///
/// `Scalar` binds the value to the first cluster of the run and zero to the
/// rest. `Malformed` covers any other shape and normalizes to all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricField {
    PerCluster(BTreeMap<String, f64>),
    Scalar(f64),
    Malformed(serde_json::Value),
}

impl MetricField {
    /// Project onto `keys`, defaulting missing clusters to 0.0
    pub fn to_cluster_map(&self, keys: &[String]) -> ClusterMap {
        match self {
            MetricField::PerCluster(values) => keys
                .iter()
                .map(|k| (k.clone(), values.get(k).copied().unwrap_or(0.0)))
                .collect(),
            MetricField::Scalar(v) => keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), if i == 0 { *v } else { 0.0 }))
                .collect(),
            MetricField::Malformed(_) => zeros(keys),
        }
    }
}

impl From<ClusterMap> for MetricField {
    fn from(map: ClusterMap) -> Self {
        MetricField::PerCluster(map)
    }
}

fn zeros(keys: &[String]) -> ClusterMap {
    keys.iter().map(|k| (k.clone(), 0.0)).collect()
}

fn normalize(field: Option<&MetricField>, keys: &[String]) -> ClusterMap {
    field
        .map(|f| f.to_cluster_map(keys))
        .unwrap_or_else(|| zeros(keys))
}

/// Fixed per-run cluster metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
    pub base_grid_kw: Option<MetricField>,
    pub cooling_capacity_kw: Option<MetricField>,
    pub battery_max_kw: Option<MetricField>,
}

impl ClusterMetadata {
    /// Cluster list for the run: `clusters`, else `regions`, else the default fleet
    pub fn cluster_keys(&self) -> Vec<String> {
        self.clusters
            .as_ref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.regions.as_ref().filter(|r| !r.is_empty()))
            .cloned()
            .unwrap_or_else(|| DEFAULT_CLUSTERS.iter().map(|c| c.to_string()).collect())
    }
}

/// Initial per-cluster telemetry for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSnapshot {
    pub timestep: u64,
    pub power_draw_kw: Option<MetricField>,
    pub cooling_online_kw: Option<MetricField>,
    pub battery_kw: Option<MetricField>,
    pub battery_out_kw: Option<MetricField>,
    pub utilization: Option<MetricField>,
    pub temp_c: Option<MetricField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_grid_kw: Option<MetricField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooling_capacity_kw: Option<MetricField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_max_kw: Option<MetricField>,
}

/// Metadata and snapshot loaded together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub metadata: ClusterMetadata,
    pub snapshot: ScenarioSnapshot,
}

impl Fixture {
    pub fn new(metadata: ClusterMetadata, snapshot: ScenarioSnapshot) -> Self {
        Self { metadata, snapshot }
    }

    /// Build the normalized resource state for a run
    pub fn to_state(&self) -> ResourceState {
        build_state(&self.metadata, &self.snapshot)
    }
}

/// Normalize metadata and a snapshot into a [`ResourceState`]
///
/// Metadata capacities take precedence over any copy carried in the
/// snapshot. Values are brought inside the state invariants: draw and
/// battery are floored at zero, utilization is clamped to `[0, 1]`, and
/// online cooling is clamped to `[0, capacity]`.
pub fn build_state(meta: &ClusterMetadata, snapshot: &ScenarioSnapshot) -> ResourceState {
    let keys = meta.cluster_keys();

    let capacity = |m: &Option<MetricField>, s: &Option<MetricField>| {
        normalize(m.as_ref().or(s.as_ref()), &keys)
    };
    let base_grid_kw = capacity(&meta.base_grid_kw, &snapshot.base_grid_kw);
    let cooling_capacity_kw = capacity(&meta.cooling_capacity_kw, &snapshot.cooling_capacity_kw);
    let battery_max_kw = capacity(&meta.battery_max_kw, &snapshot.battery_max_kw);

    let floored = |f: &Option<MetricField>| {
        let mut map = normalize(f.as_ref(), &keys);
        map.values_mut().for_each(|v| *v = v.max(0.0));
        map
    };

    let mut utilization = normalize(snapshot.utilization.as_ref(), &keys);
    utilization.values_mut().for_each(|u| *u = u.clamp(0.0, 1.0));

    let mut cooling_online_kw = normalize(snapshot.cooling_online_kw.as_ref(), &keys);
    for (c, online) in cooling_online_kw.iter_mut() {
        let cap = cooling_capacity_kw.get(c).copied().unwrap_or(0.0).max(0.0);
        *online = online.clamp(0.0, cap);
    }

    ResourceState {
        power_draw_kw: floored(&snapshot.power_draw_kw),
        battery_kw: floored(&snapshot.battery_kw),
        battery_out_kw: floored(&snapshot.battery_out_kw),
        temp_c: normalize(snapshot.temp_c.as_ref(), &keys),
        clusters: keys,
        base_grid_kw,
        battery_max_kw,
        cooling_online_kw,
        cooling_capacity_kw,
        utilization,
    }
}

/// Path of the metadata file in a data directory
pub fn metadata_path(data_dir: &Path) -> PathBuf {
    data_dir.join(METADATA_FILE)
}

/// Path of a scenario file in a data directory
pub fn scenario_path(data_dir: &Path, scenario_id: &str) -> PathBuf {
    data_dir.join(format!("scenario_DC_{}.json", scenario_id))
}

/// Read cluster metadata from a JSON file
pub fn load_metadata(path: &Path) -> Result<ClusterMetadata> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cluster metadata {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cluster metadata {}", path.display()))
}

/// Read a scenario snapshot from a JSON file
pub fn load_snapshot(path: &Path) -> Result<ScenarioSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))
}

/// Read metadata and snapshot from disk without caching
pub fn load_fixture(meta_path: &Path, scenario_path: &Path) -> Result<Fixture> {
    Ok(Fixture::new(load_metadata(meta_path)?, load_snapshot(scenario_path)?))
}
