//! Corrective planning
//!
//! A [`Planner`] turns the monitor's violation sets into an ordered,
//! schema-valid [`Plan`]. An optional remote [`PlanSource`] may be tried
//! first; the deterministic [`greedy_plan`] is always the fallback.

mod greedy;
mod remote;

pub use greedy::{greedy_plan, GreedyPlanner, COOLING_TOP_UP_CAP_KW, GREEDY_RATIONALE};
pub use remote::RemotePlanner;

use crate::hooks::HookError;
use crate::models::{ClusterMap, ResourceState};
use crate::plan::Plan;
use serde::Serialize;
use tracing::{debug, warn};

/// Read-only planning inputs
///
/// `power_draw_kw` is a private copy of the state's draw; planners may work
/// on further scratch copies of it but never see the live state.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest {
    pub clusters: Vec<String>,
    pub power_deficits: ClusterMap,
    pub thermal_violations: ClusterMap,
    pub balance: ClusterMap,
    pub battery_kw: ClusterMap,
    pub cooling_capacity_kw: ClusterMap,
    pub cooling_online_kw: ClusterMap,
    pub base_grid_kw: ClusterMap,
    pub power_draw_kw: ClusterMap,
}

impl PlanRequest {
    /// Assemble a request from a state and the monitor's derived sets
    pub fn from_state(
        state: &ResourceState,
        balance: &ClusterMap,
        power_deficits: &ClusterMap,
        thermal_violations: &ClusterMap,
    ) -> Self {
        Self {
            clusters: state.clusters.clone(),
            power_deficits: power_deficits.clone(),
            thermal_violations: thermal_violations.clone(),
            balance: balance.clone(),
            battery_kw: state.battery_kw.clone(),
            cooling_capacity_kw: state.cooling_capacity_kw.clone(),
            cooling_online_kw: state.cooling_online_kw.clone(),
            base_grid_kw: state.base_grid_kw.clone(),
            power_draw_kw: state.power_draw_kw.clone(),
        }
    }
}

/// A plan together with the reasoning behind it
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub plan: Plan,
    pub rationale: Vec<String>,
}

/// Trait for plan generators
pub trait PlanSource: Send + Sync {
    /// Short identifier used in logs and rationale
    fn name(&self) -> &str;

    /// Propose a plan for the request
    fn propose(&self, request: &PlanRequest) -> Result<Proposal, HookError>;
}

/// Which path produced the final plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    /// Remote source, accepted after validation
    Remote,
    /// Greedy planner, no remote source configured
    Greedy,
    /// Greedy planner after the remote source failed
    GreedyFallback,
    /// Greedy output failed validation and was replaced by an empty plan
    Discarded,
}

impl PlanOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanOrigin::Remote => "remote",
            PlanOrigin::Greedy => "greedy",
            PlanOrigin::GreedyFallback => "greedy_fallback",
            PlanOrigin::Discarded => "discarded",
        }
    }
}

/// Final planning result handed to the executor
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub rationale: Vec<String>,
    pub origin: PlanOrigin,
    /// Failure kind of the remote source, when it was tried and rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_kind: Option<&'static str>,
}

/// Planner with an optional remote source ahead of the greedy algorithm
#[derive(Default)]
pub struct Planner {
    remote: Option<Box<dyn PlanSource>>,
}

impl Planner {
    /// Planner that only uses the greedy algorithm
    pub fn greedy() -> Self {
        Self { remote: None }
    }

    /// Planner that tries `source` first and falls back to greedy
    pub fn with_remote(source: Box<dyn PlanSource>) -> Self {
        Self {
            remote: Some(source),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Produce a schema-valid plan; never fails
    pub fn plan(&self, request: &PlanRequest) -> PlanOutcome {
        let mut rationale = Vec::new();
        let mut fallback_kind = None;

        if let Some(source) = &self.remote {
            match self.try_remote(source.as_ref(), request) {
                Ok(proposal) => {
                    debug!(source = source.name(), actions = proposal.plan.len(), "Remote plan accepted");
                    return PlanOutcome {
                        plan: proposal.plan,
                        rationale: proposal.rationale,
                        origin: PlanOrigin::Remote,
                        fallback_kind: None,
                    };
                }
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error_kind = e.kind(),
                        error = %e,
                        "Remote planner failed, falling back to greedy planner"
                    );
                    rationale.push(format!(
                        "Remote planner error: {}: {}. Falling back to greedy planner.",
                        e.kind(),
                        e
                    ));
                    fallback_kind = Some(e.kind());
                }
            }
        }

        let mut origin = if self.remote.is_some() {
            PlanOrigin::GreedyFallback
        } else {
            PlanOrigin::Greedy
        };

        let mut plan = greedy_plan(request);
        if let Err(e) = plan.validate() {
            warn!(error = %e, "Greedy plan failed schema validation, discarding");
            rationale.push(format!("Greedy plan invalid ({}); returning empty plan.", e));
            plan = Plan::empty();
            origin = PlanOrigin::Discarded;
        }

        if rationale.is_empty() {
            rationale.push(GREEDY_RATIONALE.to_string());
        }

        PlanOutcome {
            plan,
            rationale,
            origin,
            fallback_kind,
        }
    }

    fn try_remote(&self, source: &dyn PlanSource, request: &PlanRequest) -> Result<Proposal, HookError> {
        let proposal = source.propose(request)?;
        proposal.plan.validate()?;

        let unknown = proposal.plan.unknown_clusters(&request.clusters);
        if !unknown.is_empty() {
            return Err(HookError::UnknownClusters(unknown));
        }
        Ok(proposal)
    }
}
