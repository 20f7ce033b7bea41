//! Run grading
//!
//! A [`Grader`] scores a finished run. [`StabilityGrader`] is the binary
//! local fallback; [`RemoteGrader`] asks a model for a critique and falls
//! back to the stability score on any failure.

use super::{CompletionClient, HookError};
use crate::executor::ActionRecord;
use crate::models::ClusterMap;
use crate::plan::Plan;
use serde::{Deserialize, Serialize};
use tracing::warn;

const CRITIC_SYSTEM_PROMPT: &str = "You are a datacenter operations auditor. \
Given plan/actions and final metrics, return JSON with fields: score(0..1), notes, risks[], suggestions[].";

/// Outcome of a run, as submitted for grading
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub induce_failure: bool,
    pub tau: f64,
    pub stable: bool,
    pub balance_after: ClusterMap,
    pub thermal_violations: ClusterMap,
    pub power_deficits: ClusterMap,
    pub plan: Plan,
    pub logs: Vec<ActionRecord>,
    /// Which planner produced the plan (`greedy` or `remote`)
    pub planner: String,
}

/// A grader's verdict on one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    /// In `[0, 1]`
    pub score: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Grade {
    fn binary(stable: bool, notes: impl Into<String>) -> Self {
        Self {
            score: if stable { 1.0 } else { 0.0 },
            notes: notes.into(),
            risks: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Trait for run graders; grading never fails
pub trait Grader: Send + Sync {
    fn name(&self) -> &str;

    fn grade(&self, summary: &RunSummary) -> Grade;
}

/// Scores 1.0 for a stable run and 0.0 otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct StabilityGrader;

impl Grader for StabilityGrader {
    fn name(&self) -> &str {
        "stability"
    }

    fn grade(&self, summary: &RunSummary) -> Grade {
        Grade::binary(summary.stable, "Fallback critic: pass if stable")
    }
}

/// Model-backed critic
#[derive(Debug, Clone)]
pub struct RemoteGrader {
    client: CompletionClient,
}

impl RemoteGrader {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    fn request(&self, summary: &RunSummary) -> Result<Grade, HookError> {
        let user = serde_json::to_string(summary)
            .map_err(|e| HookError::MalformedResponse(format!("cannot encode summary: {}", e)))?;
        let reply = self.client.complete_json(CRITIC_SYSTEM_PROMPT, &user)?;

        let mut grade: Grade = serde_json::from_value(reply)
            .map_err(|e| HookError::MalformedResponse(format!("invalid grade: {}", e)))?;
        if !grade.score.is_finite() {
            return Err(HookError::MalformedResponse("score is not finite".to_string()));
        }
        grade.score = grade.score.clamp(0.0, 1.0);
        Ok(grade)
    }
}

impl Grader for RemoteGrader {
    fn name(&self) -> &str {
        "remote"
    }

    fn grade(&self, summary: &RunSummary) -> Grade {
        if !self.client.has_api_key() {
            return StabilityGrader.grade(summary);
        }

        self.request(summary).unwrap_or_else(|e| {
            warn!(scenario = %summary.scenario, error_kind = e.kind(), error = %e, "Remote critic failed");
            Grade::binary(summary.stable, format!("Remote critic error: {}", e.kind()))
        })
    }
}
