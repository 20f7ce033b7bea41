//! Core data models for the fleet controller

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Temperature above which a cluster is in thermal violation (°C)
pub const TEMP_LIMIT: f64 = 80.0;

/// Power balance tolerance used while planning (kW)
pub const POWER_MARGIN: f64 = 2.0;

/// Temperature drop per kW of cooling, and kW needed per °C over the limit
pub const ALPHA: f64 = 0.25;

/// Temperature change per kW of workload moved
pub const BETA: f64 = 0.06;

/// Utilization at or above which a cluster refuses incoming workload
pub const MAX_UTIL: f64 = 0.90;

/// Default verification threshold for power balance
pub const DEFAULT_TAU: f64 = -2.0;

/// Fleet used when fixture metadata does not name its clusters
pub const DEFAULT_CLUSTERS: [&str; 4] = ["GPU_A", "CPU_B", "STORAGE_C", "EDGE_D"];

/// Per-cluster metric values keyed by cluster name
pub type ClusterMap = BTreeMap<String, f64>;

/// Read a per-cluster value, treating absent clusters as zero
pub fn value_of(map: &ClusterMap, cluster: &str) -> f64 {
    map.get(cluster).copied().unwrap_or(0.0)
}

/// Entries of `map` in cluster-list order
///
/// Keys missing from `clusters` follow in map order, so nothing is dropped.
pub fn in_cluster_order<'a>(clusters: &'a [String], map: &'a ClusterMap) -> Vec<(&'a str, f64)> {
    let listed = clusters
        .iter()
        .filter_map(|c| map.get(c).map(|v| (c.as_str(), *v)));
    let stray = map
        .iter()
        .filter(|(k, _)| !clusters.contains(*k))
        .map(|(k, v)| (k.as_str(), *v));
    listed.chain(stray).collect()
}

/// Round a kW quantity to two decimal places
pub fn round_kw(kw: f64) -> f64 {
    (kw * 100.0).round() / 100.0
}

/// Mutable snapshot of per-cluster metrics for one run
///
/// Every map carries exactly the keys in `clusters` for the lifetime of the
/// run. The executor mutates a copy of this value; capacities
/// (`base_grid_kw`, `cooling_capacity_kw`, `battery_max_kw`) never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub clusters: Vec<String>,
    pub power_draw_kw: ClusterMap,
    pub base_grid_kw: ClusterMap,
    pub battery_kw: ClusterMap,
    pub battery_out_kw: ClusterMap,
    pub battery_max_kw: ClusterMap,
    pub cooling_online_kw: ClusterMap,
    pub cooling_capacity_kw: ClusterMap,
    pub temp_c: ClusterMap,
    pub utilization: ClusterMap,
}

impl ResourceState {
    /// Create a state with every metric zeroed for the given clusters
    pub fn empty<S: AsRef<str>>(clusters: &[S]) -> Self {
        let clusters: Vec<String> = clusters.iter().map(|c| c.as_ref().to_string()).collect();
        let zeros: ClusterMap = clusters.iter().map(|c| (c.clone(), 0.0)).collect();
        Self {
            clusters,
            power_draw_kw: zeros.clone(),
            base_grid_kw: zeros.clone(),
            battery_kw: zeros.clone(),
            battery_out_kw: zeros.clone(),
            battery_max_kw: zeros.clone(),
            cooling_online_kw: zeros.clone(),
            cooling_capacity_kw: zeros.clone(),
            temp_c: zeros.clone(),
            utilization: zeros,
        }
    }

    /// Check whether the cluster belongs to this run
    pub fn has_cluster(&self, cluster: &str) -> bool {
        self.power_draw_kw.contains_key(cluster)
    }

    /// Total battery energy (reserve plus delivered) for a cluster
    pub fn battery_total_kw(&self, cluster: &str) -> f64 {
        value_of(&self.battery_kw, cluster) + value_of(&self.battery_out_kw, cluster)
    }

    /// Check the per-cluster capacity invariants
    ///
    /// Returns the first violated invariant as a message.
    pub fn check_invariants(&self) -> Result<(), String> {
        for c in &self.clusters {
            let online = value_of(&self.cooling_online_kw, c);
            let cap = value_of(&self.cooling_capacity_kw, c);
            if online < 0.0 || online > cap + 1e-9 {
                return Err(format!("{}: cooling online {} outside [0, {}]", c, online, cap));
            }
            if value_of(&self.battery_kw, c) < 0.0 {
                return Err(format!("{}: negative battery reserve", c));
            }
            let util = value_of(&self.utilization, c);
            if !(0.0..=1.0).contains(&util) {
                return Err(format!("{}: utilization {} outside [0, 1]", c, util));
            }
            if value_of(&self.power_draw_kw, c) < 0.0 {
                return Err(format!("{}: negative power draw", c));
            }
        }
        Ok(())
    }
}
