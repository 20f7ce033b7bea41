//! Closed-loop controller
//!
//! One pass: Monitor → Planner → Executor → Verifier → Narrator. The pass
//! runs exactly once per call; callers wanting convergence call again with
//! the resulting state.

mod evaluation;

#[cfg(test)]
mod tests;

pub use evaluation::{EvaluationReport, Evaluator, GeneratedEvaluation, GradedRun, RunVerdict};

use crate::config::ControllerConfig;
use crate::executor::{apply_plan, ActionRecord};
use crate::hooks::CompletionClient;
use crate::models::{ClusterMap, ResourceState, DEFAULT_TAU};
use crate::monitor::{power_balance, power_deficits, thermal_violations};
use crate::narrator::{narrate, TraceEntry};
use crate::observability::{ControllerMetrics, EventLogger};
use crate::plan::Plan;
use crate::planner::{PlanOrigin, PlanRequest, Planner, RemotePlanner};
use crate::verifier::{verify, AlertLog, FileAlertLog, Verification};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Everything observed during one control-loop pass
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub balance_before: ClusterMap,
    pub balance_after: ClusterMap,
    pub temp_before: ClusterMap,
    pub temp_after: ClusterMap,
    pub plan: Plan,
    pub rationale: Vec<String>,
    pub plan_origin: PlanOrigin,
    pub logs: Vec<ActionRecord>,
    pub verification: Verification,
    pub trace: Vec<TraceEntry>,
    #[serde(skip)]
    pub state_after: ResourceState,
}

impl RunReport {
    pub fn stable(&self) -> bool {
        self.verification.stable
    }
}

/// Monitor-plan-execute-verify loop
pub struct ControlLoop {
    planner: Planner,
    alert_log: Arc<dyn AlertLog>,
    tau: f64,
    metrics: ControllerMetrics,
}

impl ControlLoop {
    /// Loop verifying against [`DEFAULT_TAU`]
    pub fn new(planner: Planner, alert_log: Arc<dyn AlertLog>) -> Self {
        Self {
            planner,
            alert_log,
            tau: DEFAULT_TAU,
            metrics: ControllerMetrics::new(),
        }
    }

    /// Build from configuration: file alert log, remote planner when enabled
    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        let planner = if config.llm.enabled {
            let client = CompletionClient::new(&config.llm).context("Failed to build completion client")?;
            Planner::with_remote(Box::new(RemotePlanner::new(client)))
        } else {
            Planner::greedy()
        };
        let alert_log = Arc::new(FileAlertLog::new(&config.alert_log_path));
        Ok(Self::new(planner, alert_log).with_tau(config.tau))
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Run one pass against `state`; the input state is not modified
    pub fn run_once(&self, state: &ResourceState) -> RunReport {
        let started = Instant::now();
        let run_id = format!("run-{}", RUN_COUNTER.fetch_add(1, Ordering::Relaxed) + 1);
        let logger = EventLogger::new(run_id.as_str());
        logger.log_run_started(state.clusters.len(), self.tau, self.planner.has_remote());

        let balance_before = power_balance(&state.base_grid_kw, &state.power_draw_kw, &state.battery_out_kw);
        let thermal = thermal_violations(&state.temp_c);
        let deficits = power_deficits(&balance_before);

        let request = PlanRequest::from_state(state, &balance_before, &deficits, &thermal);
        let outcome = self.planner.plan(&request);

        if let Some(kind) = outcome.fallback_kind {
            let reason = outcome.rationale.first().map(String::as_str).unwrap_or_default();
            logger.log_fallback("planner", kind, reason);
            self.metrics.inc_planner_fallback(kind);
        }
        logger.log_plan(outcome.origin.as_str(), outcome.plan.len(), thermal.len(), deficits.len());

        let (logs, state_after) = apply_plan(state, &outcome.plan);
        for record in &logs {
            logger.log_action(
                &record.tool,
                record.outcome.as_str(),
                record.requested_kw,
                record.actual_kw,
                &record.message,
            );
        }

        let verification = verify(&state_after, self.tau, self.alert_log.as_ref());
        logger.log_verdict(
            verification.stable,
            verification.thermal_violations.len(),
            verification.power_deficits.len(),
            verification.alert_persisted,
        );

        let trace = narrate(&outcome.rationale, &logs, &verification);

        self.metrics.inc_run(verification.stable);
        self.metrics.observe_loop_latency(started.elapsed().as_secs_f64());

        RunReport {
            run_id,
            balance_before,
            balance_after: verification.balance_after.clone(),
            temp_before: state.temp_c.clone(),
            temp_after: state_after.temp_c.clone(),
            plan: outcome.plan,
            rationale: outcome.rationale,
            plan_origin: outcome.origin,
            logs,
            verification,
            trace,
            state_after,
        }
    }
}
