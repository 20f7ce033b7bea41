//! End-to-end tests for the control loop
//!
//! In-memory states exercise the loop properties directly; the fixture
//! tests run against the repository's `data/` directory.

#[cfg(test)]
mod loop_tests {
    use crate::control::ControlLoop;
    use crate::executor::{apply_plan, ActionOutcome};
    use crate::models::{ResourceState, DEFAULT_TAU};
    use crate::monitor::power_balance;
    use crate::plan::{Action, Plan};
    use crate::planner::{PlanOrigin, Planner};
    use crate::verifier::{assess, AlertLevel, MemoryAlertLog};
    use serde_json::json;
    use std::sync::Arc;

    fn control() -> (ControlLoop, Arc<MemoryAlertLog>) {
        let log = Arc::new(MemoryAlertLog::new());
        (ControlLoop::new(Planner::greedy(), log.clone()), log)
    }

    fn state(clusters: &[&str]) -> ResourceState {
        ResourceState::empty(clusters)
    }

    #[test]
    fn test_partial_cooling_under_headroom_limit() {
        let mut s = state(&["GPU_A"]);
        s.temp_c.insert("GPU_A".into(), 84.0);
        s.cooling_capacity_kw.insert("GPU_A".into(), 20.0);
        s.cooling_online_kw.insert("GPU_A".into(), 5.0);

        let (control, log) = control();
        let report = control.run_once(&s);

        assert_eq!(report.plan.actions, vec![Action::cooling("GPU_A", 15.0)]);
        assert_eq!(report.temp_after["GPU_A"], 80.25);
        assert_eq!(report.temp_before["GPU_A"], 84.0);
        assert!(!report.stable());
        assert_eq!(report.verification.thermal_violations["GPU_A"], 80.25);
        assert_eq!(log.records()[0].level, AlertLevel::Critical);
    }

    #[test]
    fn test_redistribution_bounded_by_need() {
        let mut s = state(&["CPU_B", "GPU_A"]);
        s.base_grid_kw.insert("GPU_A".into(), 50.0);
        s.base_grid_kw.insert("CPU_B".into(), 50.0);
        s.power_draw_kw.insert("GPU_A".into(), 60.0);
        s.power_draw_kw.insert("CPU_B".into(), 30.0);
        s.utilization.insert("CPU_B".into(), 0.5);

        let (control, log) = control();
        let report = control.run_once(&s);

        assert_eq!(report.balance_before["GPU_A"], -10.0);
        assert_eq!(report.plan.actions, vec![Action::redistribute("GPU_A", "CPU_B", 10.0)]);
        assert_eq!(report.balance_after["GPU_A"], 0.0);
        assert_eq!(report.balance_after["CPU_B"], 10.0);
        assert!(report.stable());
        assert_eq!(log.records()[0].level, AlertLevel::Ok);
    }

    #[test]
    fn test_stranded_deficit_reported_critical() {
        let mut s = state(&["CPU_B", "GPU_A"]);
        s.base_grid_kw.insert("GPU_A".into(), 40.0);
        s.base_grid_kw.insert("CPU_B".into(), 30.0);
        s.power_draw_kw.insert("GPU_A".into(), 48.0);
        s.power_draw_kw.insert("CPU_B".into(), 30.0);

        let (control, log) = control();
        let report = control.run_once(&s);

        assert!(report.plan.is_empty());
        assert!(report.logs.is_empty());
        assert_eq!(report.verification.power_deficits["GPU_A"], -8.0);
        assert_eq!(report.verification.alert.level, AlertLevel::Critical);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_loop_does_not_mutate_input() {
        let mut s = state(&["GPU_A"]);
        s.temp_c.insert("GPU_A".into(), 90.0);
        s.cooling_capacity_kw.insert("GPU_A".into(), 10.0);
        let before = s.clone();

        let (control, _) = control();
        let report = control.run_once(&s);

        assert_eq!(s, before);
        assert_ne!(report.state_after, before);
    }

    #[test]
    fn test_trace_follows_rationale_actions_verdict() {
        let mut s = state(&["GPU_A"]);
        s.temp_c.insert("GPU_A".into(), 84.0);
        s.cooling_capacity_kw.insert("GPU_A".into(), 20.0);

        let (control, _) = control();
        let report = control.run_once(&s);

        let texts: Vec<&str> = report.trace.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts[0], "Greedy planner selected minimal valid actions.");
        assert!(texts[1].starts_with("cooling_tool args="));
        assert_eq!(texts[2], "Boosted cooling 16.0 kW on GPU_A.");
        assert_eq!(texts[3], "PASS");
        assert_eq!(report.plan_origin, PlanOrigin::Greedy);
    }

    #[test]
    fn test_capacity_invariants_hold_after_execution() {
        let mut s = state(&["CPU_B", "EDGE_D", "GPU_A"]);
        for (c, grid, draw, cap, online, battery, util, temp) in [
            ("CPU_B", 40.0, 38.0, 10.0, 9.0, 2.0, 0.6, 85.0),
            ("EDGE_D", 20.0, 26.0, 8.0, 2.0, 1.0, 0.95, 88.0),
            ("GPU_A", 50.0, 61.0, 20.0, 19.0, 3.0, 0.7, 95.0),
        ] {
            s.base_grid_kw.insert(c.into(), grid);
            s.power_draw_kw.insert(c.into(), draw);
            s.cooling_capacity_kw.insert(c.into(), cap);
            s.cooling_online_kw.insert(c.into(), online);
            s.battery_kw.insert(c.into(), battery);
            s.utilization.insert(c.into(), util);
            s.temp_c.insert(c.into(), temp);
        }
        let battery_before: Vec<f64> = s.clusters.iter().map(|c| s.battery_total_kw(c)).collect();

        let (control, _) = control();
        let report = control.run_once(&s);
        let after = &report.state_after;

        assert!(after.check_invariants().is_ok());
        let battery_after: Vec<f64> = after.clusters.iter().map(|c| after.battery_total_kw(c)).collect();
        assert_eq!(battery_before, battery_after);
        for c in &after.clusters {
            assert!(after.cooling_online_kw[c] <= after.cooling_capacity_kw[c]);
            assert!(after.battery_kw[c] >= 0.0);
        }
    }

    #[test]
    fn test_redistribution_conserves_draw() {
        let mut s = state(&["CPU_B", "GPU_A"]);
        s.power_draw_kw.insert("GPU_A".into(), 42.5);
        s.power_draw_kw.insert("CPU_B".into(), 17.25);

        for (util, expect_moved) in [(0.3, true), (0.9, false)] {
            s.utilization.insert("CPU_B".into(), util);
            let (logs, after) = apply_plan(&s, &Plan::new(vec![Action::redistribute("GPU_A", "CPU_B", 7.5)]));

            let total_before = s.power_draw_kw["GPU_A"] + s.power_draw_kw["CPU_B"];
            let total_after = after.power_draw_kw["GPU_A"] + after.power_draw_kw["CPU_B"];
            assert_eq!(total_before, total_after);
            if expect_moved {
                assert_eq!(logs[0].actual_kw, 7.5);
            } else {
                assert_eq!(logs[0].actual_kw, 0.0);
                assert_eq!(after.power_draw_kw, s.power_draw_kw);
            }
        }
    }

    #[test]
    fn test_balance_identity() {
        let mut s = state(&["CPU_B", "GPU_A"]);
        s.base_grid_kw.insert("GPU_A".into(), 33.3);
        s.power_draw_kw.insert("GPU_A".into(), 41.7);
        s.battery_out_kw.insert("GPU_A".into(), 2.2);
        s.power_draw_kw.insert("CPU_B".into(), 5.0);

        let balance = power_balance(&s.base_grid_kw, &s.power_draw_kw, &s.battery_out_kw);
        for c in s.power_draw_kw.keys() {
            assert_eq!(
                balance[c],
                s.base_grid_kw[c] + s.battery_out_kw[c] - s.power_draw_kw[c]
            );
        }
    }

    #[test]
    fn test_verifier_idempotent_on_loop_output() {
        let mut s = state(&["GPU_A"]);
        s.temp_c.insert("GPU_A".into(), 82.0);
        s.cooling_capacity_kw.insert("GPU_A".into(), 4.0);

        let (control, _) = control();
        let report = control.run_once(&s);

        assert_eq!(
            assess(&report.state_after, DEFAULT_TAU),
            assess(&report.state_after, DEFAULT_TAU)
        );
    }

    #[test]
    fn test_unknown_action_leaves_state_unchanged() {
        let s = state(&["GPU_A"]);
        let plan = Plan::new(vec![Action::Unknown {
            kind: "shed_load".to_string(),
            raw: json!({"type": "shed_load", "cluster": "GPU_A", "kw": 3}),
        }]);

        let (logs, after) = apply_plan(&s, &plan);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].outcome, ActionOutcome::Unknown);
        assert_eq!(after, s);
    }

    #[test]
    fn test_schema_rejects_missing_or_negative_kw() {
        assert!(Plan::from_json(r#"{"actions": [{"type": "battery", "cluster": "GPU_A"}]}"#).is_err());
        assert!(Plan::from_json(r#"{"actions": [{"type": "battery", "cluster": "GPU_A", "kw": -1}]}"#).is_err());
    }

    #[test]
    fn test_custom_tau_applied() {
        let mut s = state(&["GPU_A"]);
        s.base_grid_kw.insert("GPU_A".into(), 10.0);
        s.power_draw_kw.insert("GPU_A".into(), 11.0);

        let (control, _) = control();
        assert!(control.run_once(&s).stable());

        let strict = ControlLoop::new(Planner::greedy(), Arc::new(MemoryAlertLog::new())).with_tau(0.0);
        let report = strict.run_once(&s);
        assert!(!report.stable());
        assert_eq!(report.verification.tau, 0.0);
    }
}

#[cfg(test)]
mod fixture_tests {
    use crate::control::{ControlLoop, Evaluator};
    use crate::fixture::FixtureCache;
    use crate::hooks::{Grade, Grader, RunSummary, StabilityGrader};
    use crate::plan::Action;
    use crate::planner::Planner;
    use crate::verifier::{FileAlertLog, MemoryAlertLog};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn repo_data_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
    }

    fn evaluator() -> Evaluator {
        let control = ControlLoop::new(Planner::greedy(), Arc::new(MemoryAlertLog::new()));
        Evaluator::new(repo_data_dir(), control).with_cache(Arc::new(FixtureCache::new(4)))
    }

    #[test]
    fn test_scenario_a_is_stable() {
        let report = evaluator().run_scenario("A", false).unwrap();
        assert!(report.plan.is_empty());
        assert!(report.stable());
    }

    #[test]
    fn test_induced_failure_on_a_is_corrected() {
        let report = evaluator().run_scenario("A", true).unwrap();
        assert_eq!(report.balance_before["GPU_A"], -6.0);
        assert_eq!(
            report.plan.actions,
            vec![
                Action::cooling("GPU_A", 12.0),
                Action::redistribute("GPU_A", "CPU_B", 6.0),
            ]
        );
        assert!(report.stable());
    }

    #[test]
    fn test_scenario_b_stays_critical() {
        let report = evaluator().run_scenario("B", false).unwrap();
        assert!(!report.stable());
        assert!(report.verification.power_deficits.contains_key("GPU_A"));
        assert!(report.logs.iter().any(|r| r.message.contains("at max util")));
    }

    #[test]
    fn test_runs_do_not_share_state() {
        let evaluator = evaluator();
        let induced = evaluator.run_scenario("A", true).unwrap();
        let clean = evaluator.run_scenario("A", false).unwrap();
        assert_ne!(induced.balance_before, clean.balance_before);
        assert_eq!(clean.balance_before["GPU_A"], 2.0);
    }

    #[test]
    fn test_evaluate_matrix() {
        let report = evaluator().evaluate().unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.passed, 2);
        assert_eq!(report.score, 0.5);
        let stable: Vec<bool> = report.runs.iter().map(|r| r.stable).collect();
        assert_eq!(stable, vec![true, true, false, false]);
    }

    #[test]
    fn test_missing_scenario_is_an_error() {
        assert!(evaluator().run_scenario("Z", false).is_err());
    }

    struct CountingGrader(StabilityGrader);

    impl Grader for CountingGrader {
        fn name(&self) -> &str {
            "counting"
        }

        fn grade(&self, summary: &RunSummary) -> Grade {
            let mut grade = self.0.grade(summary);
            grade.notes = summary.scenario.clone();
            grade
        }
    }

    #[test]
    fn test_evaluate_generated_grades_every_run() {
        let evaluator = evaluator().with_grader(Box::new(CountingGrader(StabilityGrader)));
        let first = evaluator.evaluate_generated(3, Some(11)).unwrap();
        let second = evaluator.evaluate_generated(3, Some(11)).unwrap();

        assert_eq!(first.total, 3);
        assert_eq!(first.runs[2].grade.notes, "GEN_2");
        assert_eq!(first.notes, vec!["Locally sampled scenarios."]);
        for run in &first.runs {
            assert_eq!(run.grade.score, if run.result.stable { 1.0 } else { 0.0 });
            assert_eq!(run.result.planner, "greedy");
        }
        let plans: Vec<_> = first.runs.iter().map(|r| r.result.plan.clone()).collect();
        let again: Vec<_> = second.runs.iter().map(|r| r.result.plan.clone()).collect();
        assert_eq!(plans, again);
    }

    #[test]
    fn test_alert_file_written_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.log");
        let control = ControlLoop::new(Planner::greedy(), Arc::new(FileAlertLog::new(&path)));
        let evaluator = Evaluator::new(repo_data_dir(), control);

        evaluator.evaluate().unwrap();

        let lines = std::fs::read_to_string(&path).unwrap();
        let levels: Vec<String> = lines
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["level"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(levels, vec!["OK", "OK", "CRITICAL", "CRITICAL"]);
    }
}
