//! Stability verification
//!
//! Re-derives balance and violations from the post-execution state and
//! classifies the run. Power deficits here use the caller's `tau` instead
//! of the planning margin, so a run can be planned against one threshold
//! and judged against another. Every verification appends one alert record
//! to an [`AlertLog`].

mod alert_log;

pub use alert_log::{AlertLog, FileAlertLog, MemoryAlertLog};

use crate::models::{in_cluster_order, ClusterMap, ResourceState};
use crate::monitor::{deficits_below, power_balance, thermal_violations};
use crate::observability::ControllerMetrics;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Critical,
    Ok,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Critical => write!(f, "CRITICAL"),
            AlertLevel::Ok => write!(f, "OK"),
        }
    }
}

/// Record appended to the alert log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    pub fn ok() -> Self {
        Self {
            level: AlertLevel::Ok,
            message: "All clusters stable".to_string(),
        }
    }

    /// Critical alert naming the offending clusters
    pub fn critical(clusters: &[String]) -> Self {
        Self {
            level: AlertLevel::Critical,
            message: format!("Issues detected in {:?}", clusters),
        }
    }
}

/// Verifier output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub stable: bool,
    pub tau: f64,
    pub balance_after: ClusterMap,
    pub thermal_violations: ClusterMap,
    pub power_deficits: ClusterMap,
    pub alert: Alert,
    /// False when the alert could not be written to the log
    pub alert_persisted: bool,
}

/// Classify `state` without touching the alert log
///
/// The returned verification has `alert_persisted == false`.
pub fn assess(state: &ResourceState, tau: f64) -> Verification {
    let balance_after = power_balance(&state.base_grid_kw, &state.power_draw_kw, &state.battery_out_kw);
    let thermal = thermal_violations(&state.temp_c);
    let deficits = deficits_below(&balance_after, tau);
    let stable = thermal.is_empty() && deficits.is_empty();

    let alert = if stable {
        Alert::ok()
    } else {
        // thermal clusters first, then power clusters, each in fleet order
        let offenders: Vec<String> = in_cluster_order(&state.clusters, &thermal)
            .into_iter()
            .chain(in_cluster_order(&state.clusters, &deficits))
            .map(|(c, _)| c.to_string())
            .collect();
        Alert::critical(&offenders)
    };

    Verification {
        stable,
        tau,
        balance_after,
        thermal_violations: thermal,
        power_deficits: deficits,
        alert,
        alert_persisted: false,
    }
}

/// Classify `state` and append the alert to `log`
///
/// A failed append is logged and reported through `alert_persisted`; it
/// never changes the verdict.
pub fn verify(state: &ResourceState, tau: f64, log: &dyn AlertLog) -> Verification {
    let metrics = ControllerMetrics::new();
    let mut verification = assess(state, tau);

    match log.append(&verification.alert) {
        Ok(()) => verification.alert_persisted = true,
        Err(e) => {
            warn!(
                event = "alert_write_failed",
                level = %verification.alert.level,
                error = %e,
                "Failed to append alert record"
            );
            metrics.inc_alert_write_failure();
        }
    }

    metrics.inc_alert(&verification.alert.level.to_string());
    verification
}
