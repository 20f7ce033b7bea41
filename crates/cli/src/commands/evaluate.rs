//! Fixed scenario matrix

use anyhow::Result;
use colored::Colorize;
use controller_lib::control::EvaluationReport;
use controller_lib::{ControllerConfig, Evaluator};
use tabled::Tabled;

use crate::output::{color_score, color_verdict, format_clusters, print_json, print_rows, OutputFormat};

#[derive(Tabled)]
struct VerdictRow {
    #[tabled(rename = "Scenario")]
    scenario: String,
    #[tabled(rename = "Induced Failure")]
    induced: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Thermal")]
    thermal: String,
    #[tabled(rename = "Deficits")]
    deficits: String,
}

/// Run A and B, each with and without the injected failure
pub fn evaluate(config: &ControllerConfig, format: OutputFormat) -> Result<()> {
    let evaluator = Evaluator::from_config(config)?;
    let report = evaluator.evaluate()?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!("{}", "Evaluation".bold());
    println!("{}", "=".repeat(50));

    let rows: Vec<VerdictRow> = report
        .runs
        .iter()
        .map(|run| VerdictRow {
            scenario: run.scenario.clone(),
            induced: if run.induce_failure { "yes" } else { "no" }.to_string(),
            verdict: color_verdict(run.stable),
            thermal: format_clusters(&run.thermal_violations),
            deficits: format_clusters(&run.power_deficits),
        })
        .collect();
    print_rows(&rows, "No runs");

    println!();
    println!(
        "{} {}/{} ({})",
        "Passed:".bold(),
        report.passed,
        report.total,
        color_score(report.score)
    );
}
