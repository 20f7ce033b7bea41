//! Capacity-clamped transfer functions
//!
//! Each tool mutates the working state in place and reports the amount it
//! actually applied, which may be less than requested.

use crate::models::{ResourceState, ALPHA, BETA, MAX_UTIL};

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub actual_kw: f64,
    pub message: String,
    /// False when the tool declined to act
    pub applied: bool,
}

impl ToolResult {
    fn applied(actual_kw: f64, message: String) -> Self {
        Self {
            actual_kw,
            message,
            applied: true,
        }
    }

    fn skipped(message: String) -> Self {
        Self {
            actual_kw: 0.0,
            message,
            applied: false,
        }
    }
}

fn slot<'a>(map: &'a mut crate::models::ClusterMap, cluster: &str) -> &'a mut f64 {
    map.entry(cluster.to_string()).or_insert(0.0)
}

/// Requested amount bounded to `[0, limit]`; non-finite requests apply nothing
fn bounded(kw: f64, limit: f64) -> f64 {
    if kw.is_finite() {
        kw.min(limit).max(0.0)
    } else {
        0.0
    }
}

/// Bring extra cooling online, bounded by the remaining cooling capacity
pub fn boost_cooling(state: &mut ResourceState, cluster: &str, kw: f64) -> ToolResult {
    let cap = state.cooling_capacity_kw.get(cluster).copied().unwrap_or(0.0);
    let online = slot(&mut state.cooling_online_kw, cluster);
    let head = cap - *online;
    let actual = bounded(kw, head);

    *online += actual;
    *slot(&mut state.temp_c, cluster) -= ALPHA * actual;

    ToolResult::applied(actual, format!("Boosted cooling {:.1} kW on {}.", actual, cluster))
}

/// Move energy from a cluster's battery reserve to its delivered output
pub fn discharge_battery(state: &mut ResourceState, cluster: &str, kw: f64) -> ToolResult {
    let reserve = slot(&mut state.battery_kw, cluster);
    let actual = bounded(kw, *reserve);

    *reserve -= actual;
    *slot(&mut state.battery_out_kw, cluster) += actual;

    ToolResult::applied(actual, format!("Discharged {:.1} kW battery on {}.", actual, cluster))
}

/// Shift workload from `from` to `to`
///
/// A destination at or above [`MAX_UTIL`] refuses the whole transfer.
pub fn redistribute_load(state: &mut ResourceState, from: &str, to: &str, kw: f64) -> ToolResult {
    if state.utilization.get(to).copied().unwrap_or(0.0) >= MAX_UTIL {
        return ToolResult::skipped(format!("Redistribute skipped: {} at max util.", to));
    }

    let source_draw = slot(&mut state.power_draw_kw, from);
    let actual = bounded(kw, *source_draw);
    *source_draw = (*source_draw - actual).max(0.0);
    *slot(&mut state.temp_c, from) -= BETA * actual;
    let source_util = slot(&mut state.utilization, from);
    *source_util = (*source_util - 0.01 * actual).max(0.0);

    *slot(&mut state.power_draw_kw, to) += actual;
    *slot(&mut state.temp_c, to) += BETA * actual;
    let dest_util = slot(&mut state.utilization, to);
    *dest_util = (*dest_util + 0.01 * actual).min(1.0);

    ToolResult::applied(actual, format!("Redistributed {:.1} kW {}→{}.", actual, from, to))
}
