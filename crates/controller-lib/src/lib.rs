//! Controller library for datacenter fleet rebalancing
//!
//! This crate provides the core functionality for:
//! - Resource state modelling and threshold monitoring
//! - Greedy constraint-based corrective planning
//! - Capacity-clamped plan execution
//! - Stability verification with a durable alert log
//! - ReAct-style narration of a control-loop pass
//! - Scenario fixtures, optional remote hooks, and an evaluation harness

pub mod config;
pub mod control;
pub mod executor;
pub mod fixture;
pub mod hooks;
pub mod models;
pub mod monitor;
pub mod narrator;
pub mod observability;
pub mod plan;
pub mod planner;
pub mod verifier;

pub use config::{ControllerConfig, LlmConfig};
pub use control::{ControlLoop, Evaluator, RunReport};
pub use models::*;
pub use observability::{ControllerMetrics, EventLogger};
pub use plan::{Action, Plan, SchemaViolation};
