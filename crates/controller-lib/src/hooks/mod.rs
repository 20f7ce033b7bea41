//! Optional external hooks
//!
//! Three request/response capabilities sit outside the control loop:
//! plan generation (see [`crate::planner::RemotePlanner`]), scenario
//! generation, and run grading. Each has a deterministic local
//! implementation that is always available and is used whenever the
//! remote service is unconfigured, unreachable, slow, or returns
//! something unusable.

mod completion;
mod critic;
mod scenario;

pub use completion::CompletionClient;
pub use critic::{Grade, Grader, RemoteGrader, RunSummary, StabilityGrader};
pub use scenario::{GeneratedScenarios, LocalSampler, RemoteScenarioGenerator, ScenarioSource};

use crate::plan::SchemaViolation;
use std::time::Duration;
use thiserror::Error;

/// Failure of an optional external hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("plan rejected: {0}")]
    SchemaViolation(#[from] SchemaViolation),
    #[error("plan references unknown clusters: {}", .0.join(", "))]
    UnknownClusters(Vec<String>),
}

impl HookError {
    /// Short, stable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            HookError::MissingApiKey => "missing_api_key",
            HookError::Timeout(_) => "timeout",
            HookError::Transport(_) => "transport",
            HookError::Status(_) => "status",
            HookError::MalformedResponse(_) => "malformed_response",
            HookError::SchemaViolation(_) => "schema_violation",
            HookError::UnknownClusters(_) => "unknown_clusters",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = [
            HookError::MissingApiKey,
            HookError::Timeout(Duration::from_secs(30)),
            HookError::Transport("refused".into()),
            HookError::Status(503),
            HookError::MalformedResponse("no content".into()),
            HookError::SchemaViolation(SchemaViolation::NotAnObject),
            HookError::UnknownClusters(vec!["GPU_Z".into()]),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(HookError::kind).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_unknown_clusters_message_lists_names() {
        let err = HookError::UnknownClusters(vec!["GPU_Z".into(), "X".into()]);
        assert_eq!(err.to_string(), "plan references unknown clusters: GPU_Z, X");
    }
}
