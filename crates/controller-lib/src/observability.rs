//! Observability infrastructure for the fleet controller
//!
//! Provides:
//! - Prometheus metrics (runs by verdict, actions by outcome, planner
//!   fallbacks, alerts, fixture cache hits, loop latency)
//! - Structured logging of control-loop events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for one control-loop pass (in seconds)
const LOOP_LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0,
];

static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    runs: IntCounterVec,
    actions: IntCounterVec,
    planner_fallbacks: IntCounterVec,
    alerts: IntCounterVec,
    alert_write_failures: IntCounter,
    fixture_cache: IntCounterVec,
    loop_latency_seconds: Histogram,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            runs: register_int_counter_vec!(
                "fleet_controller_runs_total",
                "Control-loop runs by verdict",
                &["verdict"]
            )
            .expect("Failed to register runs_total"),

            actions: register_int_counter_vec!(
                "fleet_controller_actions_total",
                "Executed actions by kind and outcome",
                &["kind", "outcome"]
            )
            .expect("Failed to register actions_total"),

            planner_fallbacks: register_int_counter_vec!(
                "fleet_controller_planner_fallbacks_total",
                "Remote planner failures that fell back to the greedy planner",
                &["reason"]
            )
            .expect("Failed to register planner_fallbacks_total"),

            alerts: register_int_counter_vec!(
                "fleet_controller_alerts_total",
                "Verifier alerts by level",
                &["level"]
            )
            .expect("Failed to register alerts_total"),

            alert_write_failures: register_int_counter!(
                "fleet_controller_alert_write_failures_total",
                "Alerts that could not be appended to the alert log"
            )
            .expect("Failed to register alert_write_failures_total"),

            fixture_cache: register_int_counter_vec!(
                "fleet_controller_fixture_cache_total",
                "Fixture cache lookups by result",
                &["result"]
            )
            .expect("Failed to register fixture_cache_total"),

            loop_latency_seconds: register_histogram!(
                "fleet_controller_loop_latency_seconds",
                "Wall time of one monitor-plan-execute-verify pass",
                LOOP_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register loop_latency_seconds"),
        }
    }
}

/// Controller metrics for Prometheus exposition
///
/// Lightweight handle to the process-wide metrics; clones share them.
#[derive(Clone)]
pub struct ControllerMetrics {
    _private: (),
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    /// Create a handle, registering the metrics on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControllerMetricsInner {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new)
    }

    pub fn inc_run(&self, stable: bool) {
        let verdict = if stable { "pass" } else { "fail" };
        self.inner().runs.with_label_values(&[verdict]).inc();
    }

    pub fn inc_action(&self, kind: &str, outcome: &str) {
        self.inner().actions.with_label_values(&[kind, outcome]).inc();
    }

    pub fn inc_planner_fallback(&self, reason: &str) {
        self.inner().planner_fallbacks.with_label_values(&[reason]).inc();
    }

    pub fn inc_alert(&self, level: &str) {
        self.inner().alerts.with_label_values(&[level]).inc();
    }

    pub fn inc_alert_write_failure(&self) {
        self.inner().alert_write_failures.inc();
    }

    /// Count a fixture cache lookup
    pub fn inc_fixture_cache(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.inner().fixture_cache.with_label_values(&[result]).inc();
    }

    pub fn observe_loop_latency(&self, duration_secs: f64) {
        self.inner().loop_latency_seconds.observe(duration_secs);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for control-loop events
#[derive(Clone)]
pub struct EventLogger {
    run_id: String,
}

impl EventLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log the start of a run
    pub fn log_run_started(&self, clusters: usize, tau: f64, remote_planner: bool) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            clusters = clusters,
            tau = tau,
            remote_planner = remote_planner,
            "Control loop started"
        );
    }

    /// Log the plan chosen for execution
    pub fn log_plan(&self, origin: &str, actions: usize, thermal: usize, deficits: usize) {
        info!(
            event = "plan_selected",
            run_id = %self.run_id,
            origin = %origin,
            actions = actions,
            thermal_violations = thermal,
            power_deficits = deficits,
            "Plan selected"
        );
    }

    /// Log one executed action
    pub fn log_action(&self, tool: &str, outcome: &str, requested_kw: Option<f64>, actual_kw: f64, message: &str) {
        debug!(
            event = "action_executed",
            run_id = %self.run_id,
            tool = %tool,
            outcome = %outcome,
            requested_kw = ?requested_kw,
            actual_kw = actual_kw,
            message = %message,
            "Action executed"
        );
    }

    /// Log a fallback from a remote hook to its local implementation
    pub fn log_fallback(&self, hook: &str, error_kind: &str, error: &str) {
        warn!(
            event = "hook_fallback",
            run_id = %self.run_id,
            hook = %hook,
            error_kind = %error_kind,
            error = %error,
            "Remote hook failed, using local implementation"
        );
    }

    /// Log the verifier's verdict
    pub fn log_verdict(&self, stable: bool, thermal: usize, deficits: usize, alert_persisted: bool) {
        if stable {
            info!(
                event = "run_verified",
                run_id = %self.run_id,
                stable = true,
                alert_persisted = alert_persisted,
                "All clusters stable"
            );
        } else {
            warn!(
                event = "run_verified",
                run_id = %self.run_id,
                stable = false,
                thermal_violations = thermal,
                power_deficits = deficits,
                alert_persisted = alert_persisted,
                "Residual violations after execution"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = ControllerMetrics::new();
        metrics.inc_run(true);
        metrics.inc_action("cooling", "applied");
        metrics.inc_planner_fallback("timeout");
        metrics.inc_alert("OK");
        metrics.inc_fixture_cache(false);
        metrics.observe_loop_latency(0.002);

        let text = ControllerMetrics::default().gather_text();
        assert!(text.contains("fleet_controller_runs_total"));
        assert!(text.contains("fleet_controller_actions_total"));
        assert!(text.contains("fleet_controller_loop_latency_seconds"));
    }

    #[test]
    fn test_event_logger_run_id() {
        let logger = EventLogger::new("run-1");
        assert_eq!(logger.run_id(), "run-1");
        logger.log_verdict(false, 1, 0, true);
    }
}
