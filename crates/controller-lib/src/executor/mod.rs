//! Plan execution
//!
//! Applies a plan to a working copy of the state, one action at a time, in
//! plan order. Every action yields an [`ActionRecord`] carrying both the
//! requested and the actually applied amount. Nothing here fails: unknown
//! actions and actions naming clusters outside the run are recorded and
//! leave the state untouched.

mod tools;

pub use tools::{boost_cooling, discharge_battery, redistribute_load, ToolResult};

use crate::models::ResourceState;
use crate::observability::ControllerMetrics;
use crate::plan::{Action, Plan};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// What happened to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Executed; `actual_kw` may still be clamped to zero
    Applied,
    /// Declined by the tool or aimed at a cluster outside the run
    Skipped,
    /// Unrecognized action kind
    Unknown,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Applied => "applied",
            ActionOutcome::Skipped => "skipped",
            ActionOutcome::Unknown => "unknown",
        }
    }
}

/// One executed action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    /// Tool that handled the action (`cooling_tool`, `battery_tool`, ...)
    pub tool: String,
    pub action: Action,
    /// `None` for unknown actions
    pub requested_kw: Option<f64>,
    pub actual_kw: f64,
    pub outcome: ActionOutcome,
    pub message: String,
}

impl ActionRecord {
    /// Parameters of the action plus the applied amount
    pub fn args(&self) -> Value {
        match &self.action {
            Action::Cooling { cluster, kw } | Action::Battery { cluster, kw } => {
                json!({"cluster": cluster, "kw": kw, "actual": self.actual_kw})
            }
            Action::Redistribute { from, to, kw } => {
                json!({"src": from, "dst": to, "kw": kw, "actual": self.actual_kw})
            }
            Action::Unknown { raw, .. } => json!({"raw": raw}),
        }
    }
}

/// Tool name for an action kind
pub fn tool_name(action: &Action) -> &'static str {
    match action {
        Action::Cooling { .. } => "cooling_tool",
        Action::Battery { .. } => "battery_tool",
        Action::Redistribute { .. } => "redistribute_tool",
        Action::Unknown { .. } => "unknown_tool",
    }
}

fn tool_outcome(result: ToolResult) -> (ActionOutcome, f64, String) {
    let outcome = if result.applied {
        ActionOutcome::Applied
    } else {
        ActionOutcome::Skipped
    };
    (outcome, result.actual_kw, result.message)
}

/// Apply a single action to `state` in place
pub fn apply_action(state: &mut ResourceState, action: &Action) -> ActionRecord {
    let tool = tool_name(action);

    let stray: Vec<&str> = action
        .clusters()
        .into_iter()
        .filter(|c| !state.has_cluster(c))
        .collect();

    let (outcome, actual_kw, message) = match action {
        Action::Unknown { kind, .. } => {
            (ActionOutcome::Unknown, 0.0, format!("Unknown action: {}", kind))
        }
        _ if !stray.is_empty() => (
            ActionOutcome::Skipped,
            0.0,
            format!("Skipped {}: unknown cluster {}.", tool, stray.join(", ")),
        ),
        Action::Cooling { cluster, kw } => tool_outcome(boost_cooling(state, cluster, *kw)),
        Action::Battery { cluster, kw } => tool_outcome(discharge_battery(state, cluster, *kw)),
        Action::Redistribute { from, to, kw } => {
            tool_outcome(redistribute_load(state, from, to, *kw))
        }
    };

    ActionRecord {
        timestamp: Utc::now(),
        tool: tool.to_string(),
        action: action.clone(),
        requested_kw: action.kw(),
        actual_kw,
        outcome,
        message,
    }
}

/// Apply every action of `plan` to a copy of `state`
///
/// Returns the per-action records in plan order and the resulting state;
/// the input state is not modified.
pub fn apply_plan(state: &ResourceState, plan: &Plan) -> (Vec<ActionRecord>, ResourceState) {
    let metrics = ControllerMetrics::new();
    let mut working = state.clone();
    let mut logs = Vec::with_capacity(plan.len());

    for action in plan.iter() {
        let record = apply_action(&mut working, action);
        metrics.inc_action(record.tool.trim_end_matches("_tool"), record.outcome.as_str());
        debug!(
            tool = %record.tool,
            outcome = record.outcome.as_str(),
            actual_kw = record.actual_kw,
            "Applied action"
        );
        logs.push(record);
    }

    (logs, working)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ResourceState {
        let mut s = ResourceState::empty(&["CPU_B", "GPU_A"]);
        s.cooling_capacity_kw.insert("GPU_A".into(), 20.0);
        s.cooling_online_kw.insert("GPU_A".into(), 5.0);
        s.temp_c.insert("GPU_A".into(), 84.0);
        s.power_draw_kw.insert("GPU_A".into(), 60.0);
        s.power_draw_kw.insert("CPU_B".into(), 30.0);
        s.battery_kw.insert("GPU_A".into(), 4.0);
        s.utilization.insert("CPU_B".into(), 0.4);
        s
    }

    #[test]
    fn test_apply_plan_preserves_order_and_input() {
        let input = state();
        let plan = Plan::new(vec![
            Action::cooling("GPU_A", 15.0),
            Action::redistribute("GPU_A", "CPU_B", 10.0),
            Action::battery("GPU_A", 10.0),
        ]);

        let (logs, after) = apply_plan(&input, &plan);

        assert_eq!(input, state());
        let tools: Vec<&str> = logs.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, vec!["cooling_tool", "redistribute_tool", "battery_tool"]);
        assert_eq!(logs[2].requested_kw, Some(10.0));
        assert_eq!(logs[2].actual_kw, 4.0);
        assert_eq!(after.cooling_online_kw["GPU_A"], 20.0);
        assert_eq!(after.power_draw_kw["GPU_A"], 50.0);
        assert_eq!(after.battery_out_kw["GPU_A"], 4.0);
        assert!(after.check_invariants().is_ok());
    }

    #[test]
    fn test_unknown_action_is_logged_no_op() {
        let input = state();
        let unknown = Action::Unknown {
            kind: "vent".to_string(),
            raw: json!({"type": "vent", "cluster": "GPU_A"}),
        };
        let (logs, after) = apply_plan(&input, &Plan::new(vec![unknown]));

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].outcome, ActionOutcome::Unknown);
        assert_eq!(logs[0].tool, "unknown_tool");
        assert_eq!(logs[0].requested_kw, None);
        assert_eq!(logs[0].args()["raw"]["type"], "vent");
        assert_eq!(after, input);
    }

    #[test]
    fn test_unknown_cluster_is_skipped() {
        let input = state();
        let (logs, after) = apply_plan(&input, &Plan::new(vec![Action::battery("GPU_Z", 3.0)]));

        assert_eq!(logs[0].outcome, ActionOutcome::Skipped);
        assert_eq!(logs[0].actual_kw, 0.0);
        assert!(logs[0].message.contains("GPU_Z"));
        assert_eq!(after, input);
    }

    #[test]
    fn test_max_util_gate_marks_skipped() {
        let mut input = state();
        input.utilization.insert("CPU_B".into(), 0.95);
        let (logs, after) = apply_plan(&input, &Plan::new(vec![Action::redistribute("GPU_A", "CPU_B", 5.0)]));

        assert_eq!(logs[0].outcome, ActionOutcome::Skipped);
        assert_eq!(after.power_draw_kw, input.power_draw_kw);
    }

    #[test]
    fn test_self_redistribute_is_zero_net() {
        let input = state();
        let (logs, after) = apply_plan(&input, &Plan::new(vec![Action::redistribute("GPU_A", "GPU_A", 5.0)]));

        assert_eq!(logs[0].outcome, ActionOutcome::Applied);
        assert_eq!(after.power_draw_kw["GPU_A"], 60.0);
        assert!((after.temp_c["GPU_A"] - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_args_shape() {
        let (logs, _) = apply_plan(&state(), &Plan::new(vec![Action::redistribute("GPU_A", "CPU_B", 2.0)]));
        let args = logs[0].args();
        assert_eq!(args["src"], "GPU_A");
        assert_eq!(args["dst"], "CPU_B");
        assert_eq!(args["actual"], 2.0);
    }
}
