//! Datacenter fleet controller CLI
//!
//! Runs single control-loop passes on fixture scenarios, the fixed
//! evaluation matrix, and graded evaluations over generated scenarios.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{evaluate, generate, run};
use controller_lib::ControllerMetrics;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Datacenter fleet controller CLI
#[derive(Parser)]
#[command(name = "dcctl")]
#[command(author, version, about = "CLI for the Datacenter Fleet Controller", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/dcctl/config.toml when present)
    #[arg(long, global = true, env = "DCCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding clusters.json and scenario_DC_<ID>.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Alert log file (JSON lines, appended)
    #[arg(long, global = true)]
    pub alert_log: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one control-loop pass on a fixture scenario
    Run {
        /// Scenario ID (loads scenario_DC_<ID>.json)
        #[arg(long, short, default_value = "A")]
        scenario: String,

        /// Add 8 kW draw and 4 °C to GPU_A before planning
        #[arg(long)]
        induce_failure: bool,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Run the fixed scenario matrix (A, B with and without induced failure)
    Evaluate {
        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Generate scenarios, run the loop on each, and grade the runs
    Generate {
        /// Number of scenarios to generate
        #[arg(long, short = 'n', default_value_t = 3)]
        count: usize,

        /// Seed for the local sampler (scenario i uses seed + i)
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        loop_args: LoopArgs,
    },
}

/// Options shared by every loop-running command
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LoopArgs {
    /// Stability threshold on per-cluster balance (kW)
    #[arg(long, allow_hyphen_values = true)]
    pub tau: Option<f64>,

    /// Try the remote LLM hooks before the local ones
    #[arg(long)]
    pub use_llm: bool,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let base = config::load(cli)?;

    match &cli.command {
        Commands::Run {
            scenario,
            induce_failure,
            loop_args,
        } => {
            let config = config::apply_loop_args(base, loop_args);
            run::run_scenario(&config, scenario, *induce_failure, cli.format)?;
        }
        Commands::Evaluate { loop_args } => {
            let config = config::apply_loop_args(base, loop_args);
            evaluate::evaluate(&config, cli.format)?;
        }
        Commands::Generate {
            count,
            seed,
            loop_args,
        } => {
            let config = config::apply_loop_args(base, loop_args);
            generate::evaluate_generated(&config, *count, *seed, cli.format)?;
        }
    }

    if cli.metrics {
        print!("{}", ControllerMetrics::new().gather_text());
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(e) = execute(&cli) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
