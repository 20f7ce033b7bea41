//! Graded evaluation over generated scenarios

use anyhow::Result;
use colored::Colorize;
use controller_lib::control::GeneratedEvaluation;
use controller_lib::{ControllerConfig, Evaluator};
use tabled::Tabled;

use crate::output::{
    color_score, color_verdict, format_clusters, print_info, print_json, print_rows, OutputFormat,
};

#[derive(Tabled)]
struct GradedRow {
    #[tabled(rename = "Scenario")]
    scenario: String,
    #[tabled(rename = "Planner")]
    planner: String,
    #[tabled(rename = "Actions")]
    actions: usize,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Deficits")]
    deficits: String,
    #[tabled(rename = "Grade")]
    grade: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

/// Generate `count` scenarios, run the loop on each, and grade the runs
pub fn evaluate_generated(
    config: &ControllerConfig,
    count: usize,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let evaluator = Evaluator::from_config(config)?;
    let result = evaluator.evaluate_generated(count, seed)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_result(&result),
    }

    Ok(())
}

fn print_result(result: &GeneratedEvaluation) {
    println!("{}", "Generated Evaluation".bold());
    println!("{}", "=".repeat(50));
    for note in &result.notes {
        print_info(note);
    }

    let rows: Vec<GradedRow> = result
        .runs
        .iter()
        .map(|run| GradedRow {
            scenario: run.result.scenario.clone(),
            planner: run.result.planner.clone(),
            actions: run.result.plan.len(),
            verdict: color_verdict(run.result.stable),
            deficits: format_clusters(&run.result.power_deficits),
            grade: color_score(run.grade.score),
            notes: run.grade.notes.clone(),
        })
        .collect();
    println!();
    print_rows(&rows, "No scenarios generated");

    println!();
    println!(
        "{} {}/{} ({})",
        "Passed:".bold(),
        result.passed,
        result.total,
        color_score(result.score)
    );
}
