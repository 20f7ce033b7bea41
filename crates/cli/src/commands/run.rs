//! Single control-loop pass on a fixture scenario

use anyhow::Result;
use colored::Colorize;
use controller_lib::{ControllerConfig, Evaluator, RunReport};
use tabled::Tabled;

use crate::output::{
    color_balance, color_level, color_outcome, color_phase, color_verdict, format_clusters, format_kw,
    format_optional_kw, print_heading, print_info, print_json, print_rows, print_success, print_warning,
    OutputFormat,
};

#[derive(Tabled)]
struct BalanceRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Balance Before")]
    before: String,
    #[tabled(rename = "Balance After")]
    after: String,
    #[tabled(rename = "Temp Before")]
    temp_before: String,
    #[tabled(rename = "Temp After")]
    temp_after: String,
}

#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Args")]
    args: String,
    #[tabled(rename = "Requested")]
    requested: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct TraceRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Text")]
    text: String,
}

/// Run one pass and print the report
pub fn run_scenario(config: &ControllerConfig, scenario: &str, induce_failure: bool, format: OutputFormat) -> Result<()> {
    let evaluator = Evaluator::from_config(config)?;
    let report = evaluator.run_scenario(scenario, induce_failure)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let label = if induce_failure {
                format!("{} (induced failure)", scenario)
            } else {
                scenario.to_string()
            };
            println!("{} {}", "Scenario".bold(), label.cyan());
            print_report(&report);
        }
    }

    Ok(())
}

/// Table rendering of a run report
pub fn print_report(report: &RunReport) {
    let v = &report.verification;

    println!("Run:       {}", report.run_id.dimmed());
    println!("Planner:   {}", report.plan_origin.as_str());
    println!("Tau:       {}", format_kw(v.tau));

    print_heading("Power Balance");
    let rows: Vec<BalanceRow> = report
        .balance_before
        .iter()
        .map(|(cluster, before)| BalanceRow {
            cluster: cluster.clone(),
            before: color_balance(*before, v.tau),
            after: report
                .balance_after
                .get(cluster)
                .map(|b| color_balance(*b, v.tau))
                .unwrap_or_default(),
            temp_before: report
                .temp_before
                .get(cluster)
                .map(|t| format!("{:.1} °C", t))
                .unwrap_or_default(),
            temp_after: report
                .temp_after
                .get(cluster)
                .map(|t| format!("{:.1} °C", t))
                .unwrap_or_default(),
        })
        .collect();
    print_rows(&rows, "No clusters");

    print_heading("Actions");
    let rows: Vec<ActionRow> = report
        .logs
        .iter()
        .map(|record| ActionRow {
            time: record.timestamp.format("%H:%M:%S%.3f").to_string(),
            tool: record.tool.clone(),
            args: record.args().to_string(),
            requested: format_optional_kw(record.requested_kw),
            actual: format_kw(record.actual_kw),
            outcome: color_outcome(record.outcome),
            message: record.message.clone(),
        })
        .collect();
    print_rows(&rows, "No actions planned");

    print_heading("Trace");
    let rows: Vec<TraceRow> = report
        .trace
        .iter()
        .map(|entry| TraceRow {
            phase: color_phase(entry.phase),
            text: entry.text.clone(),
        })
        .collect();
    print_rows(&rows, "Empty trace");

    println!();
    println!("Thermal violations: {}", format_clusters(&v.thermal_violations));
    println!("Power deficits:     {}", format_clusters(&v.power_deficits));
    println!("Alert:              {} {}", color_level(v.alert.level), v.alert.message);
    if !v.alert_persisted {
        print_warning("Alert could not be written to the alert log");
    }

    if report.stable() {
        print_success(&format!("Verdict: {}", color_verdict(true)));
    } else {
        print_info(&format!("Verdict: {}", color_verdict(false)));
    }
}
