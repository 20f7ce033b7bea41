//! CLI subcommands

pub mod evaluate;
pub mod generate;
pub mod run;
