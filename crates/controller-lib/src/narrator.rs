//! Reason/Act/Observe trace of a run

use crate::executor::ActionRecord;
use crate::verifier::Verification;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Reason,
    Act,
    Observe,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Reason => write!(f, "Reason"),
            Phase::Act => write!(f, "Act"),
            Phase::Observe => write!(f, "Observe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub phase: Phase,
    pub text: String,
}

impl TraceEntry {
    fn new(phase: Phase, text: impl Into<String>) -> Self {
        Self {
            phase,
            text: text.into(),
        }
    }
}

/// Build the trace: rationale, then an Act/Observe pair per action, then the verdict
pub fn narrate(rationale: &[String], logs: &[ActionRecord], verification: &Verification) -> Vec<TraceEntry> {
    let mut trace = Vec::with_capacity(rationale.len() + 2 * logs.len() + 1);

    trace.extend(rationale.iter().map(|r| TraceEntry::new(Phase::Reason, r.as_str())));

    for record in logs {
        trace.push(TraceEntry::new(
            Phase::Act,
            format!("{} args={}", record.tool, record.args()),
        ));
        trace.push(TraceEntry::new(Phase::Observe, record.message.as_str()));
    }

    let verdict = if verification.stable {
        "PASS".to_string()
    } else {
        format!(
            "FAIL {:?} {:?}",
            verification.power_deficits, verification.thermal_violations
        )
    };
    trace.push(TraceEntry::new(Phase::Observe, verdict));

    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::apply_plan;
    use crate::models::ResourceState;
    use crate::plan::{Action, Plan};
    use crate::verifier::assess;

    fn hot_state() -> ResourceState {
        let mut s = ResourceState::empty(&["GPU_A"]);
        s.temp_c.insert("GPU_A".into(), 84.0);
        s.cooling_capacity_kw.insert("GPU_A".into(), 20.0);
        s.cooling_online_kw.insert("GPU_A".into(), 5.0);
        s
    }

    #[test]
    fn test_trace_order() {
        let state = hot_state();
        let (logs, after) = apply_plan(&state, &Plan::new(vec![Action::cooling("GPU_A", 15.0)]));
        let verification = assess(&after, -2.0);
        let rationale = vec!["first".to_string(), "second".to_string()];

        let trace = narrate(&rationale, &logs, &verification);
        let phases: Vec<Phase> = trace.iter().map(|e| e.phase).collect();

        assert_eq!(
            phases,
            vec![Phase::Reason, Phase::Reason, Phase::Act, Phase::Observe, Phase::Observe]
        );
        assert!(trace[2].text.starts_with("cooling_tool args="));
        assert_eq!(trace[3].text, "Boosted cooling 15.0 kW on GPU_A.");
        assert_eq!(trace[4].text, r#"FAIL {} {"GPU_A": 80.25}"#);
    }

    #[test]
    fn test_pass_verdict() {
        let mut state = hot_state();
        state.temp_c.insert("GPU_A".into(), 70.0);
        let verification = assess(&state, -2.0);

        let trace = narrate(&[], &[], &verification);
        assert_eq!(trace, vec![TraceEntry::new(Phase::Observe, "PASS")]);
    }
}
