//! LLM-backed plan source
//!
//! Sends the planning inputs to a chat-completions endpoint and parses the
//! reply as a plan. Validation against the plan schema and the run's
//! cluster list happens in [`super::Planner`], so every remote source gets
//! the same checks.

use super::{PlanRequest, PlanSource, Proposal};
use crate::hooks::{CompletionClient, HookError};
use crate::plan::Plan;
use serde_json::json;

const PLANNER_SYSTEM_PROMPT: &str = "You are a datacenter planner. Choose actions from {cooling,battery,redistribute}.\n\
Obey capacities and nonnegativity. Prefer moving workload OFF hot/deficit clusters.\n\
Respond strictly as JSON with schema: {\"actions\": [{...}]}";

const PLANNER_GOAL: &str =
    "Eliminate thermal violations and raise balances >= tau with minimal battery/cooling.";

/// Plan source that asks a remote model for the plan
#[derive(Debug, Clone)]
pub struct RemotePlanner {
    client: CompletionClient,
}

impl RemotePlanner {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// User message sent with each request
    fn user_message(request: &PlanRequest) -> String {
        json!({
            "power_defs": request.power_deficits,
            "thermal_viol": request.thermal_violations,
            "balance": request.balance,
            "caps": {
                "battery_kw": request.battery_kw,
                "cooling_cap": request.cooling_capacity_kw,
                "cooling_on": request.cooling_online_kw,
            },
            "grid": {"base_grid": request.base_grid_kw},
            "power_draw": request.power_draw_kw,
            "goal": PLANNER_GOAL,
        })
        .to_string()
    }
}

impl PlanSource for RemotePlanner {
    fn name(&self) -> &str {
        "remote"
    }

    fn propose(&self, request: &PlanRequest) -> Result<Proposal, HookError> {
        let reply = self
            .client
            .complete_json(PLANNER_SYSTEM_PROMPT, &Self::user_message(request))?;
        let plan = Plan::from_value(&reply)?;

        let hot: Vec<&String> = request.thermal_violations.keys().collect();
        let shortfall: std::collections::BTreeMap<&String, f64> =
            request.power_deficits.iter().map(|(c, b)| (c, -b)).collect();

        Ok(Proposal {
            plan,
            rationale: vec![
                "Remote planner proposed actions with constraints enforced.".to_string(),
                format!("Thermal clusters: {:?}", hot),
                format!("Power deficits: {:?}", shortfall),
            ],
        })
    }
}
