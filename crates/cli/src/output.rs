//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use controller_lib::executor::ActionOutcome;
use controller_lib::narrator::Phase;
use controller_lib::verifier::AlertLevel;
use controller_lib::ClusterMap;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table, or a placeholder line when empty
pub fn print_rows<T: Tabled>(items: &[T], empty: &str) {
    if items.is_empty() {
        println!("{}", empty.yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("\n{}", title.bold().underline());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a power value in kW
pub fn format_kw(kw: f64) -> String {
    format!("{:.1} kW", kw)
}

/// Format an optional requested amount; unknown actions carry none and show "-"
pub fn format_optional_kw(kw: Option<f64>) -> String {
    kw.map(format_kw).unwrap_or_else(|| "-".to_string())
}

/// Format a score in [0, 1] as a percentage
pub fn format_score(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Comma-separated cluster names, or "-" when none
pub fn format_clusters(map: &ClusterMap) -> String {
    if map.is_empty() {
        "-".to_string()
    } else {
        map.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub fn color_verdict(stable: bool) -> String {
    if stable {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    }
}

pub fn color_level(level: AlertLevel) -> String {
    match level {
        AlertLevel::Ok => level.to_string().green().to_string(),
        AlertLevel::Critical => level.to_string().red().bold().to_string(),
    }
}

pub fn color_outcome(outcome: ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Applied => outcome.as_str().green().to_string(),
        ActionOutcome::Skipped => outcome.as_str().yellow().to_string(),
        ActionOutcome::Unknown => outcome.as_str().red().to_string(),
    }
}

pub fn color_phase(phase: Phase) -> String {
    match phase {
        Phase::Reason => phase.to_string().blue().to_string(),
        Phase::Act => phase.to_string().cyan().to_string(),
        Phase::Observe => phase.to_string().magenta().to_string(),
    }
}

/// Color a balance: negative values red, tight ones yellow
pub fn color_balance(balance: f64, tau: f64) -> String {
    let formatted = format!("{:+.1}", balance);
    if balance < tau {
        formatted.red().to_string()
    } else if balance < 0.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Color a score: green at 80% and up, yellow at 60%, red below
pub fn color_score(score: f64) -> String {
    let formatted = format_score(score);
    if score >= 0.8 {
        formatted.green().to_string()
    } else if score >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
