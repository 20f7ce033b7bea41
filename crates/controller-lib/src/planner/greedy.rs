//! Deterministic greedy planner
//!
//! Single pass, two phases:
//!
//! ```text
//! thermal:  for c in thermal_violations
//!               need = max(0, (temp - TEMP_LIMIT) / ALPHA)
//!               head = max(0, cooling_capacity - cooling_online)
//!               emit Cooling(c, min(need, head))
//!
//! power:    for c in power_deficits
//!               need = -balance[c]
//!               redistribute to donors with grid slack (scratch draw updated)
//!               then battery, then a cooling top-up capped at 5 kW if c is hot
//! ```
//!
//! Clusters, deficits and donors are all visited in the request's
//! cluster-list order. Every kW value is rounded to two decimals;
//! zero-magnitude actions are never emitted.

use super::{PlanRequest, PlanSource, Proposal};
use crate::hooks::HookError;
use crate::models::{in_cluster_order, round_kw, value_of, ClusterMap, ALPHA, TEMP_LIMIT};
use crate::plan::{Action, Plan};

/// Hard cap on the cooling top-up issued from the power pass (kW)
pub const COOLING_TOP_UP_CAP_KW: f64 = 5.0;

/// Rationale recorded when the greedy planner produced the plan on its own
pub const GREEDY_RATIONALE: &str = "Greedy planner selected minimal valid actions.";

/// Build the greedy corrective plan for a request
///
/// The request's `power_draw_kw` is copied into a scratch map so later
/// redistribution decisions see the effect of earlier ones without touching
/// the caller's state.
pub fn greedy_plan(request: &PlanRequest) -> Plan {
    let mut draw: ClusterMap = request.power_draw_kw.clone();
    let mut actions = Vec::new();

    for (c, temp) in in_cluster_order(&request.clusters, &request.thermal_violations) {
        let need_kw = ((temp - TEMP_LIMIT) / ALPHA).max(0.0);
        let head = cooling_headroom(request, c);
        if head > 0.0 && need_kw > 0.0 {
            actions.push(Action::cooling(c, round_kw(need_kw.min(head))));
        }
    }

    for (c, bal) in in_cluster_order(&request.clusters, &request.power_deficits) {
        let mut need = -bal;

        // Donor slack is measured once per deficit cluster, before any of
        // its own transfers land.
        let donors: Vec<(String, f64)> = in_cluster_order(&request.clusters, &request.balance)
            .into_iter()
            .filter(|(d, _)| *d != c)
            .map(|(d, _)| (d.to_string(), (value_of(&request.base_grid_kw, d) - value_of(&draw, d)).max(0.0)))
            .collect();

        for (d, slack) in donors {
            if slack <= 0.0 {
                continue;
            }
            let take = need.min(slack).min(value_of(&draw, c));
            if take > 0.0 {
                actions.push(Action::redistribute(c, d.clone(), round_kw(take)));
                let from = (value_of(&draw, c) - take).max(0.0);
                draw.insert(c.to_string(), from);
                *draw.entry(d).or_insert(0.0) += take;
                need -= take;
            }
            if need <= 0.0 {
                break;
            }
        }

        if need > 0.0 {
            let take = need.min(value_of(&request.battery_kw, c));
            if take > 0.0 {
                actions.push(Action::battery(c, round_kw(take)));
                need -= take;
            }
        }

        if need > 0.0 && request.thermal_violations.contains_key(c) {
            let head = cooling_headroom(request, c);
            if head > 0.0 {
                let kw = need.min(head).min(COOLING_TOP_UP_CAP_KW);
                actions.push(Action::cooling(c, round_kw(kw)));
            }
        }
    }

    Plan::new(actions)
}

fn cooling_headroom(request: &PlanRequest, cluster: &str) -> f64 {
    (value_of(&request.cooling_capacity_kw, cluster) - value_of(&request.cooling_online_kw, cluster))
        .max(0.0)
}

/// Local plan source backed by [`greedy_plan`]; always available
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPlanner;

impl PlanSource for GreedyPlanner {
    fn name(&self) -> &str {
        "greedy"
    }

    fn propose(&self, request: &PlanRequest) -> Result<Proposal, HookError> {
        Ok(Proposal {
            plan: greedy_plan(request),
            rationale: vec![GREEDY_RATIONALE.to_string()],
        })
    }
}
